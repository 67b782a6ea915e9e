//! Run command - execute a Lua script file.

use anyhow::{Context, Result};
use clap::Args;
use lunax_runtime::{LuaResult, Runtime, RuntimeConfig};
use std::path::PathBuf;
use tracing::debug;

#[derive(Args)]
pub struct RunCommand {
    /// File to execute
    pub entry: PathBuf,

    /// Arguments to pass to the script as `arg[1..]`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

impl RunCommand {
    pub fn run(&self, config: RuntimeConfig) -> Result<()> {
        let runtime = Runtime::with_config(config).context("failed to create runtime")?;
        self.set_script_args(&runtime)?;

        debug!(entry = %self.entry.display(), args = self.args.len(), "running script");
        runtime
            .exec_file(&self.entry)
            .with_context(|| format!("failed to run {}", self.entry.display()))
    }

    /// Expose the command line as the global `arg` table, script name at 0
    fn set_script_args(&self, runtime: &Runtime) -> LuaResult<()> {
        let state = runtime.state();
        state.push(&self.args)?;
        state.push(&*self.entry.to_string_lossy())?;
        state.raw_set_index(-2, 0);
        state.set_global("arg")?;
        Ok(())
    }
}
