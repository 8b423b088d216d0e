use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "minijit.toml";
pub const DEFAULT_OUTPUT: &str = "dist/output.css";
pub const DEFAULT_CONTENT: &str = "src/**/*.{html,js,jsx,ts,tsx}";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub content: Vec<String>,
    #[serde(default)]
    pub watch: WatchConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_stability_threshold_ms")]
    pub stability_threshold_ms: u64,
    #[serde(default = "default_stability_poll_ms")]
    pub stability_poll_ms: u64,
    #[serde(default)]
    pub poll: bool,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ConfigError {
    pub message: String,
}

impl Config {
    /// The configured output path, or the conventional default.
    pub fn output_path(&self) -> PathBuf {
        match self.output.as_deref().map(str::trim) {
            Some(output) if !output.is_empty() => PathBuf::from(output),
            _ => PathBuf::from(DEFAULT_OUTPUT),
        }
    }

    /// The configured content globs, or the default source glob when empty.
    pub fn content_globs(&self) -> Vec<String> {
        let globs = self
            .content
            .iter()
            .map(|glob| glob.trim())
            .filter(|glob| !glob.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>();
        if globs.is_empty() {
            vec![DEFAULT_CONTENT.to_string()]
        } else {
            globs
        }
    }
}

pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let text = fs::read_to_string(path).map_err(|err| ConfigError {
        message: format!("failed to read config {}: {}", path.display(), err),
    })?;
    toml::from_str(&text).map_err(|err| ConfigError {
        message: format!("failed to parse config {}: {}", path.display(), err),
    })
}

/// Loads an explicitly requested config, or `minijit.toml` under `base_dir`
/// when it exists. Without either, every option takes its default.
pub fn load_or_default(explicit: Option<&Path>, base_dir: &Path) -> Result<Config, ConfigError> {
    if let Some(path) = explicit {
        return load(path);
    }
    let candidate = base_dir.join(DEFAULT_CONFIG_FILE);
    if candidate.is_file() {
        log::debug!("using config {}", candidate.display());
        return load(&candidate);
    }
    Ok(Config::default())
}

fn default_debounce_ms() -> u64 {
    120
}

fn default_stability_threshold_ms() -> u64 {
    100
}

fn default_stability_poll_ms() -> u64 {
    50
}

fn default_poll_interval_ms() -> u64 {
    500
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            stability_threshold_ms: default_stability_threshold_ms(),
            stability_poll_ms: default_stability_poll_ms(),
            poll: false,
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, DEFAULT_CONTENT, DEFAULT_OUTPUT, load, load_or_default};
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn loads_toml_config() {
        let path = temp_path("minijit_config");
        let _ = fs::write(
            &path,
            r#"
output = "public/app.css"
content = ["pages/**/*.html", "components/**/*.tsx"]
"#,
        );
        let config = load(&path).expect("config should parse");
        assert_eq!(config.output_path(), PathBuf::from("public/app.css"));
        assert_eq!(
            config.content_globs(),
            vec![
                "pages/**/*.html".to_string(),
                "components/**/*.tsx".to_string()
            ]
        );
    }

    #[test]
    fn defaults_when_empty() {
        let path = temp_path("minijit_config_default");
        let _ = fs::write(&path, "");
        let config = load(&path).expect("config should parse");
        assert_eq!(config, Config::default());
        assert_eq!(config.output_path(), PathBuf::from(DEFAULT_OUTPUT));
        assert_eq!(config.content_globs(), vec![DEFAULT_CONTENT.to_string()]);
        assert_eq!(config.watch.debounce_ms, 120);
        assert_eq!(config.watch.stability_threshold_ms, 100);
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let path = temp_path("minijit_config_blank");
        let _ = fs::write(&path, "output = \"  \"\ncontent = [\"\", \" \"]\n");
        let config = load(&path).expect("config should parse");
        assert_eq!(config.output_path(), PathBuf::from(DEFAULT_OUTPUT));
        assert_eq!(config.content_globs(), vec![DEFAULT_CONTENT.to_string()]);
    }

    #[test]
    fn loads_watch_tuning() {
        let path = temp_path("minijit_config_watch");
        let _ = fs::write(
            &path,
            r#"
[watch]
debounce_ms = 250
poll = true
"#,
        );
        let config = load(&path).expect("config should parse");
        assert_eq!(config.watch.debounce_ms, 250);
        assert!(config.watch.poll);
        assert_eq!(config.watch.poll_interval_ms, 500);
        assert_eq!(config.watch.stability_poll_ms, 50);
    }

    #[test]
    fn reports_parse_errors_with_path() {
        let path = temp_path("minijit_config_bad");
        let _ = fs::write(&path, "content = 3");
        let err = load(&path).expect_err("content must be a list");
        assert!(err.message.contains("failed to parse config"));
        assert!(err.message.contains(&path.display().to_string()));
    }

    #[test]
    fn explicit_config_must_exist() {
        let missing = temp_path("minijit_config_missing");
        let err = load_or_default(Some(&missing), &std::env::temp_dir())
            .expect_err("missing explicit config should fail");
        assert!(err.message.contains("failed to read config"));
    }

    #[test]
    fn missing_default_config_yields_defaults() {
        let base = temp_path("minijit_config_dir");
        let _ = fs::create_dir_all(&base);
        let config = load_or_default(None, &base).expect("defaults should apply");
        assert_eq!(config, Config::default());
    }

    fn temp_path(prefix: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        std::env::temp_dir().join(format!("{}_{}.toml", prefix, nanos))
    }
}
