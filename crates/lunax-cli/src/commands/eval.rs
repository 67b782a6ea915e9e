//! Eval command - execute an inline chunk and print its results.

use anyhow::{Context, Result};
use clap::Args;
use lunax_runtime::{FromStack, LuaResult, Runtime, RuntimeConfig, State};
use serde_json::Value;

#[derive(Args)]
pub struct EvalCommand {
    /// Chunk to evaluate, e.g. `return 1 + 1`
    pub chunk: String,

    /// Pretty-print table results
    #[arg(long)]
    pub pretty: bool,
}

impl EvalCommand {
    pub fn run(&self, config: RuntimeConfig) -> Result<()> {
        for line in self.evaluate(config)? {
            println!("{}", line);
        }
        Ok(())
    }

    /// One rendered line per chunk result
    fn evaluate(&self, config: RuntimeConfig) -> Result<Vec<String>> {
        let runtime = Runtime::with_config(config).context("failed to create runtime")?;
        let results: Vec<Rendered> = runtime
            .eval_all(&self.chunk)
            .context("failed to evaluate chunk")?;

        results
            .into_iter()
            .map(|Rendered(value)| -> Result<String> {
                let line = match value {
                    Value::String(text) => text,
                    other if self.pretty => serde_json::to_string_pretty(&other)?,
                    other => serde_json::to_string(&other)?,
                };
                Ok(line)
            })
            .collect()
    }
}

/// A chunk result as JSON; values with no JSON form render as `<type>`
struct Rendered(Value);

impl FromStack for Rendered {
    const EXPECTED: &'static str = "any value";

    fn matches(_state: &State, _index: i32) -> bool {
        true
    }

    fn extract(state: &State, index: i32) -> LuaResult<Self> {
        let placeholder = || Value::String(format!("<{}>", state.type_name(index)));
        if !Value::matches(state, index) {
            return Ok(Rendered(placeholder()));
        }
        Ok(Rendered(
            Value::extract(state, index).unwrap_or_else(|_| placeholder()),
        ))
    }
}
