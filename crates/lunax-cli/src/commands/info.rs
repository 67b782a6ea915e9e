//! Info command - show runtime and configuration information.

use anyhow::Result;
use clap::Args;
use lunax_runtime::{LUA_RELEASE, RuntimeConfig};

#[derive(Args)]
pub struct InfoCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl InfoCommand {
    pub fn run(&self, config: &RuntimeConfig) -> Result<()> {
        let info = RuntimeInfo::collect(config);

        if self.json {
            println!("{}", serde_json::to_string_pretty(&info)?);
        } else {
            self.print_human_readable(&info);
        }

        Ok(())
    }

    fn print_human_readable(&self, info: &RuntimeInfo) {
        println!("Lunax Runtime");
        println!("=============");
        println!();
        println!("Version:     {}", info.version);
        println!("Lua:         {}", info.lua);
        println!("Platform:    {}", info.platform);
        println!("Arch:        {}", info.arch);
        println!();
        println!("Config:");
        println!(
            "  Standard libs:  {}",
            if info.config.open_libs {
                "enabled"
            } else {
                "disabled"
            }
        );
        println!(
            "  Registration:   {}",
            if info.config.strict_registration {
                "strict"
            } else {
                "lenient"
            }
        );
        if !info.config.package_path.is_empty() {
            println!("  Package path:   {}", info.config.package_path.join(";"));
        }
    }
}

#[derive(serde::Serialize)]
struct RuntimeInfo {
    version: String,
    lua: String,
    platform: String,
    arch: String,
    config: RuntimeConfig,
}

impl RuntimeInfo {
    fn collect(config: &RuntimeConfig) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            lua: LUA_RELEASE.to_string(),
            platform: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            config: config.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_serializes_config() {
        let info = RuntimeInfo::collect(&RuntimeConfig::minimal());
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["lua"], "Lua 5.1.5");
        assert_eq!(json["config"]["open_libs"], false);
    }
}
