use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Optional defaults loaded from `~/.aryanblock/config.toml`. Command-line
/// flags always win over config values.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pretty_errors: bool,
    pub no_sema: bool,
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::home_dir().map(|h| h.join(".aryanblock").join("config.toml"))
}

pub fn resolve_config_path(cli_path: &Option<PathBuf>) -> Option<PathBuf> {
    if let Some(p) = cli_path {
        return Some(p.clone());
    }
    default_config_path()
}

/// A missing or malformed config file silently falls back to defaults.
pub fn load(path: &Option<PathBuf>) -> Config {
    let Some(path) = path else {
        return Config::default();
    };
    load_from(path).unwrap_or_default()
}

fn load_from(path: &Path) -> Option<Config> {
    let contents = std::fs::read_to_string(path).ok()?;
    toml::from_str(&contents).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = load(&Some(PathBuf::from("/nonexistent/aryanblock.toml")));
        assert!(!cfg.pretty_errors);
        assert!(!cfg.no_sema);
    }

    #[test]
    fn parses_partial_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).expect("create");
        writeln!(file, "pretty_errors = true").expect("write");
        let cfg = load(&Some(path));
        assert!(cfg.pretty_errors);
        assert!(!cfg.no_sema);
    }
}
