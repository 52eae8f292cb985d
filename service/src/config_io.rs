use std::path::{Path, PathBuf};

use dbfs_core::config::{AuthUser, FsConfig};
use dbfs_core::format::ExportFormat;

const MAX_CONFIG_BYTES: usize = 4 * 1024 * 1024;

/// Reads a `.toml` (default) or `.json` configuration file.
pub fn load_config(path: impl AsRef<Path>) -> anyhow::Result<FsConfig> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    if bytes.len() > MAX_CONFIG_BYTES {
        anyhow::bail!(
            "config file is too large ({} bytes; max {} bytes)",
            bytes.len(),
            MAX_CONFIG_BYTES
        );
    }
    let raw = String::from_utf8(bytes)?;
    let ext = path.extension().and_then(|s| s.to_str());
    let config: FsConfig = match ext {
        Some("json") => serde_json::from_str(&raw)?,
        Some("toml") | None => toml::from_str(&raw)?,
        Some(other) => anyhow::bail!("unsupported config extension: {other}"),
    };
    config.validate().map_err(anyhow::Error::msg)?;
    Ok(config)
}

/// Command-line values layered over the config file.
#[derive(Debug, Default)]
pub struct CliOverrides {
    /// Appended after the databases from the file.
    pub db_paths: Vec<PathBuf>,
    /// Replaces the file's format list.
    pub formats: Option<Vec<ExportFormat>>,
    pub allow_abspath: bool,
    pub anonymous: bool,
    pub user: Option<(String, String)>,
    /// Replaces `limits.max_io_ms`.
    pub timeout_ms: Option<u64>,
}

impl CliOverrides {
    pub fn apply(self, config: &mut FsConfig) {
        config.databases.extend(self.db_paths);
        if let Some(formats) = self.formats {
            config.formats = formats;
        }
        if self.allow_abspath {
            config.escape_hatch.enabled = true;
        }
        if self.anonymous {
            config.auth.anonymous = true;
        }
        if let Some((username, password)) = self.user {
            config.auth.users.push(AuthUser { username, password });
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.limits.max_io_ms = timeout_ms;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_toml_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let toml_path = dir.path().join("dbfs.toml");
        std::fs::write(
            &toml_path,
            "databases = [\"/srv/a.sqlite\"]\nformats = [\"csv\"]\n",
        )
        .unwrap();
        let config = load_config(&toml_path).unwrap();
        assert_eq!(config.databases, vec![PathBuf::from("/srv/a.sqlite")]);
        assert_eq!(config.formats, vec![ExportFormat::Csv]);

        let json_path = dir.path().join("dbfs.json");
        std::fs::write(&json_path, r#"{"formats": [".jsonl"], "auth": {"anonymous": true}}"#)
            .unwrap();
        let config = load_config(&json_path).unwrap();
        assert_eq!(config.formats, vec![ExportFormat::JsonLines]);
        assert!(config.auth.anonymous);
    }

    #[test]
    fn rejects_duplicate_database_names_and_unknown_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dbfs.toml");
        std::fs::write(&path, "databases = [\"/a/x.db\", \"/b/x.db\"]\n").unwrap();
        let err = load_config(&path).expect_err("duplicate names");
        assert!(err.to_string().contains("unique"));

        let path = dir.path().join("dbfs.yaml");
        std::fs::write(&path, "").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn overrides_extend_and_enable() {
        let mut config = FsConfig {
            databases: vec![PathBuf::from("/srv/a.sqlite")],
            ..FsConfig::default()
        };
        CliOverrides {
            db_paths: vec![PathBuf::from("/srv/b.sqlite")],
            formats: Some(vec![ExportFormat::Tsv]),
            allow_abspath: true,
            anonymous: false,
            user: Some(("reader".to_string(), "secret".to_string())),
            timeout_ms: Some(1_500),
        }
        .apply(&mut config);

        assert_eq!(
            config.databases,
            vec![PathBuf::from("/srv/a.sqlite"), PathBuf::from("/srv/b.sqlite")]
        );
        assert_eq!(config.formats, vec![ExportFormat::Tsv]);
        assert!(config.escape_hatch.enabled);
        assert!(!config.auth.anonymous);
        assert_eq!(config.auth.users.len(), 1);
        assert_eq!(config.limits.max_io_ms, 1_500);
        config.auth.validate().unwrap();
    }

    #[test]
    fn empty_overrides_change_nothing() {
        let mut config = FsConfig::default();
        CliOverrides::default().apply(&mut config);
        assert!(config.databases.is_empty());
        assert_eq!(config.formats, ExportFormat::ALL.to_vec());
        assert!(!config.escape_hatch.enabled);
        assert_eq!(config.limits.max_io_ms, 30_000);
    }

    #[test]
    fn zero_timeout_override_fails_validation() {
        let mut config = FsConfig::default();
        CliOverrides {
            timeout_ms: Some(0),
            ..CliOverrides::default()
        }
        .apply(&mut config);
        assert!(config.validate().is_err());
    }
}
