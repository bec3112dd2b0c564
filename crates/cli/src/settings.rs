//! Configuration loading.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use notifications::{ConfigFile, NotificationsConfig};

/// Used when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "bellwether.toml";

/// Loads the configuration named by `explicit`, or `bellwether.toml` in the
/// working directory, or built-in defaults if neither exists. Environment
/// overrides are applied last.
pub fn load(explicit: Option<&Path>) -> Result<NotificationsConfig> {
    load_with_env(explicit, |key| std::env::var(key).ok())
}

pub fn load_with_env<F>(explicit: Option<&Path>, lookup: F) -> Result<NotificationsConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_PATH);
            default.exists().then_some(default)
        }
    };

    let file = match &path {
        Some(path) => {
            let source = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            ConfigFile::from_toml_str(&source)
                .with_context(|| format!("invalid configuration in {}", path.display()))?
        }
        None => {
            tracing::info!("No configuration file found; using defaults");
            ConfigFile::default()
        }
    };

    let config = file.notifications.with_env_overrides(lookup);
    config
        .validate()
        .context("configuration is invalid after environment overrides")?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use notifications::BackendKind;

    use super::*;

    #[test]
    fn explicit_file_is_loaded_and_env_applied() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bellwether.toml");
        std::fs::write(
            &path,
            r#"
[notifications]
type = "local"

[notifications.emailer.smtp]
host = "smtp.example.com"
username = "bot"
"#,
        )
        .unwrap();

        let config = load_with_env(Some(&path), |key| match key {
            "BELLWETHER_SMTP_PASSWORD" => Some("hunter2".into()),
            "BELLWETHER_SLACK_WEBHOOK_URL" => Some("https://hooks.slack.com/services/T/B/X".into()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.kind, BackendKind::Local);
        let smtp = config.emailer.smtp.unwrap();
        assert_eq!(smtp.password.as_deref(), Some("hunter2"));
        assert_eq!(smtp.username.as_deref(), Some("bot"));
        assert!(config.slack.webhook_url.is_some());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_with_env(Some(&dir.path().join("absent.toml")), |_| None).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }

    #[test]
    fn invalid_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[notifications.delivery]\nworkers = 0\n").unwrap();

        let err = load_with_env(Some(&path), |_| None).unwrap_err();
        assert!(err.to_string().contains("bad.toml"));
    }
}
