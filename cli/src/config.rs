use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use toml_edit::DocumentMut;
use toml_edit::Item as TomlItem;

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";

const DEFAULT_CONFIG: &str = r#"# Image Studio configuration.

# Root URL of the generation backend.
server_url = "http://127.0.0.1:5000"

# Where downloaded images are saved. Defaults to the platform download directory.
# download_dir = "/home/me/Downloads"

# Show the prompt optimization control.
include_optimization = true

# Echo the original prompt and uploaded images in each response.
include_echo_sections = true

# Abort requests after this many seconds. Unset leaves the transport default.
# request_timeout_secs = 120
"#;

/// Values read from `config.toml`. Unset keys stay `None` so CLI flags and defaults can fill them.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FileConfig {
    pub server_url: Option<String>,
    pub download_dir: Option<PathBuf>,
    pub include_optimization: Option<bool>,
    pub include_echo_sections: Option<bool>,
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn new_default() -> anyhow::Result<Self> {
        Ok(Self::new(studio_home()?.join("config.toml")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the config file. A missing file is empty; a malformed one is ignored with a warning.
    pub fn load(&self) -> anyhow::Result<FileConfig> {
        let Some(content) = read_document_string(&self.path)? else {
            return Ok(FileConfig::default());
        };
        match content.parse::<DocumentMut>() {
            Ok(doc) => Ok(read_file_config(&doc)),
            Err(err) => {
                tracing::warn!("ignoring malformed {}: {err}", self.path.display());
                Ok(FileConfig::default())
            }
        }
    }

    /// Write the commented default config. Returns `false` when a config already exists.
    pub fn init(&self) -> anyhow::Result<bool> {
        if self.path.exists() {
            return Ok(false);
        }
        studio_tui::write_atomic(&self.path, DEFAULT_CONFIG.as_bytes())
            .with_context(|| format!("write {}", self.path.display()))?;
        Ok(true)
    }
}

/// `~/.imagestudio`, home of the config file and the log directory.
pub fn studio_home() -> anyhow::Result<PathBuf> {
    let Some(home) = dirs::home_dir() else {
        anyhow::bail!("cannot determine home directory for config path");
    };
    Ok(home.join(".imagestudio"))
}

fn read_file_config(doc: &DocumentMut) -> FileConfig {
    FileConfig {
        server_url: read_str(doc, "server_url").map(str::to_string),
        download_dir: read_str(doc, "download_dir").map(PathBuf::from),
        include_optimization: read_bool(doc, "include_optimization"),
        include_echo_sections: read_bool(doc, "include_echo_sections"),
        request_timeout_secs: doc
            .get("request_timeout_secs")
            .and_then(TomlItem::as_integer)
            .and_then(|secs| u64::try_from(secs).ok()),
    }
}

fn read_str<'a>(doc: &'a DocumentMut, key: &str) -> Option<&'a str> {
    doc.get(key).and_then(TomlItem::as_str)
}

fn read_bool(doc: &DocumentMut, key: &str) -> Option<bool> {
    doc.get(key).and_then(TomlItem::as_bool)
}

fn read_document_string(path: &Path) -> anyhow::Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(anyhow::Error::new(err).context("read config.toml")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_file_is_empty_config() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = ConfigStore::new(dir.path().join("config.toml"));
        assert_eq!(store.load()?, FileConfig::default());
        Ok(())
    }

    #[test]
    fn reads_known_keys() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"# comment
server_url = "http://studio.local:8080"
download_dir = "/tmp/images"
include_optimization = false
request_timeout_secs = 30
unrelated = 1
"#,
        )?;

        let config = ConfigStore::new(path).load()?;
        assert_eq!(
            config,
            FileConfig {
                server_url: Some("http://studio.local:8080".to_string()),
                download_dir: Some(PathBuf::from("/tmp/images")),
                include_optimization: Some(false),
                include_echo_sections: None,
                request_timeout_secs: Some(30),
            }
        );
        Ok(())
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "server_url = [unterminated")?;
        assert_eq!(ConfigStore::new(path).load()?, FileConfig::default());
        Ok(())
    }

    #[test]
    fn init_writes_defaults_once() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = ConfigStore::new(dir.path().join("nested").join("config.toml"));

        assert!(store.init()?);
        assert!(!store.init()?);

        let config = store.load()?;
        assert_eq!(config.server_url.as_deref(), Some(DEFAULT_SERVER_URL));
        assert_eq!(config.include_optimization, Some(true));
        assert_eq!(config.include_echo_sections, Some(true));
        assert_eq!(config.request_timeout_secs, None);
        Ok(())
    }
}
