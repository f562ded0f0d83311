use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};

use tracing::debug;

use crate::{env_subst::substitute_env, schema::SwitchyardConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "switchyard.toml",
    "switchyard.yaml",
    "switchyard.yml",
    "switchyard.json",
];

/// Override for the config directory, set via `set_config_dir()`.
static CONFIG_DIR_OVERRIDE: Mutex<Option<PathBuf>> = Mutex::new(None);

/// Set a custom config directory. When set, discovery only looks in this
/// directory. Each call replaces the previous override.
pub fn set_config_dir(path: PathBuf) {
    *CONFIG_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(|e| e.into_inner()) = Some(path);
}

/// Clear the config directory override, restoring default discovery.
pub fn clear_config_dir() {
    *CONFIG_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(|e| e.into_inner()) = None;
}

fn config_dir_override() -> Option<PathBuf> {
    CONFIG_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .clone()
}

/// Load and validate config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<SwitchyardConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    let config = parse_config(&raw, path)?;
    config.validate()?;
    Ok(config)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./switchyard.{toml,yaml,yml,json}` (working directory)
/// 2. `~/.config/switchyard/switchyard.{toml,yaml,yml,json}`
///
/// Returns `SwitchyardConfig::default()` only if no file is found; a file
/// that fails to parse or validate is an error.
pub fn discover_and_load() -> anyhow::Result<SwitchyardConfig> {
    let Some(path) = find_config_file() else {
        debug!("no config file found, using defaults");
        return Ok(SwitchyardConfig::default());
    };
    debug!(path = %path.display(), "loading config");
    load_config(&path)
}

/// Find the first config file in standard locations.
///
/// When a config dir override is set, only that directory is searched.
fn find_config_file() -> Option<PathBuf> {
    if let Some(dir) = config_dir_override() {
        return first_existing(&dir);
    }

    if let Some(path) = first_existing(Path::new(".")) {
        return Some(path);
    }

    home_dir()
        .map(|h| h.join(".config").join("switchyard"))
        .and_then(|dir| first_existing(&dir))
}

fn first_existing(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Returns the config directory: override, or `~/.config/switchyard/`.
pub fn config_dir() -> Option<PathBuf> {
    if let Some(dir) = config_dir_override() {
        return Some(dir);
    }
    home_dir().map(|h| h.join(".config").join("switchyard"))
}

fn home_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}

/// Parse raw config text, picking the format from the file extension.
pub fn parse_config(raw: &str, path: &Path) -> anyhow::Result<SwitchyardConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::schema::OverflowPolicy;

    #[test]
    fn parses_each_format() {
        let toml_cfg = parse_config(
            "[common]\nmsg_cmd_offset = 500\n",
            Path::new("switchyard.toml"),
        )
        .unwrap();
        assert_eq!(toml_cfg.common.msg_cmd_offset, 500);

        let yaml_cfg = parse_config(
            "sink:\n  overflow: block\n  mailbox_capacity: 8\n",
            Path::new("switchyard.yaml"),
        )
        .unwrap();
        assert_eq!(yaml_cfg.sink.overflow, OverflowPolicy::Block);
        assert_eq!(yaml_cfg.sink.mailbox_capacity, 8);

        let json_cfg = parse_config(
            r#"{"gateway": {"session_idle_timeout_secs": 60}}"#,
            Path::new("switchyard.json"),
        )
        .unwrap();
        assert_eq!(json_cfg.gateway.session_idle_timeout_secs, 60);
    }

    #[test]
    fn rejects_unknown_extension() {
        assert!(parse_config("", Path::new("switchyard.ini")).is_err());
    }

    #[test]
    fn load_substitutes_env_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("switchyard.toml");
        std::fs::write(
            &path,
            "[gateway]\ntoken_db = \"${SWITCHYARD_LOADER_TEST_DB:-sqlite::memory:}\"\n",
        )
        .unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.gateway.token_db, "sqlite::memory:");

        std::fs::write(&path, "[common]\nmsg_cmd_offset = 0\n").unwrap();
        assert!(load_config(&path).is_err());
    }

    // Single test: the override is process-global.
    #[test]
    fn discovery_honours_override() {
        let dir = tempfile::tempdir().unwrap();
        set_config_dir(dir.path().to_path_buf());

        let empty = discover_and_load();
        assert_eq!(config_dir().as_deref(), Some(dir.path()));

        let path = dir.path().join("switchyard.yml");
        std::fs::write(&path, "common:\n  msg_cmd_offset: 4096\n").unwrap();
        let found = discover_and_load();

        std::fs::write(&path, "common:\n  msg_cmd_offset: 0\n").unwrap();
        let invalid = discover_and_load();

        std::fs::write(&path, "common:\n  msg_cmd_offset: nope\n").unwrap();
        let malformed = discover_and_load();
        clear_config_dir();

        assert_eq!(empty.unwrap().common.msg_cmd_offset, 1000);
        assert_eq!(found.unwrap().common.msg_cmd_offset, 4096);
        assert!(invalid.is_err());
        assert!(malformed.is_err());
    }
}
