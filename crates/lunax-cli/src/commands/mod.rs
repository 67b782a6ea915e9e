//! CLI command implementations.

use anyhow::{Context, Result};
use lunax_runtime::RuntimeConfig;
use std::path::Path;
use tracing::debug;

pub mod eval;
pub mod info;
pub mod run;

/// Load the runtime configuration, falling back to defaults without a path
pub fn load_config(path: Option<&Path>) -> Result<RuntimeConfig> {
    let Some(path) = path else {
        return Ok(RuntimeConfig::default());
    };
    let config = RuntimeConfig::from_file(path)
        .with_context(|| format!("failed to load config {}", path.display()))?;
    debug!(path = %path.display(), "loaded config");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_without_path() {
        assert_eq!(load_config(None).unwrap(), RuntimeConfig::default());
    }

    #[test]
    fn test_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "strict_registration = false").unwrap();
        let config = load_config(Some(file.path())).unwrap();
        assert!(!config.strict_registration);
    }

    #[test]
    fn test_bad_config_names_the_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "no_such_option = 1").unwrap();
        let err = load_config(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("failed to load config"));
    }
}
