//! Layered client settings.
//!
//! Sources, lowest priority first: built-in defaults, an optional TOML file,
//! then `APPWATCH_*` environment variables (`__` separates nesting, e.g.
//! `APPWATCH_BACKEND__ENDPOINT`). The binary applies its flags on top.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::data::duration::parse_duration;
use crate::stream::StreamOptions;

const ENV_PREFIX: &str = "APPWATCH";

/// Where and how to reach the metrics backend.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendSettings {
    pub endpoint: String,
    pub token: Option<String>,
    /// Also send the token as `?token=` on stream requests.
    pub token_in_query: bool,
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamSettings {
    pub retry_delay: Duration,
    pub history_capacity: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub backend: BackendSettings,
    pub stream: StreamSettings,
}

#[derive(Debug, Deserialize)]
struct RawSettings {
    backend: RawBackend,
    stream: RawStream,
}

#[derive(Debug, Deserialize)]
struct RawBackend {
    endpoint: String,
    token: Option<String>,
    token_in_query: bool,
    timeout: String,
    connect_timeout: String,
}

#[derive(Debug, Deserialize)]
struct RawStream {
    retry_delay: String,
    history_capacity: usize,
}

impl Settings {
    /// Load settings from defaults, `path` (if given) and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::build(path, Environment::with_prefix(ENV_PREFIX))
    }

    fn build(path: Option<&Path>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("backend.endpoint", "http://127.0.0.1:8000")?
            .set_default("backend.token_in_query", true)?
            .set_default("backend.timeout", "10s")?
            .set_default("backend.connect_timeout", "5s")?
            .set_default("stream.retry_delay", "5s")?
            .set_default(
                "stream.history_capacity",
                appwatch_types::DEFAULT_HISTORY_CAPACITY as u64,
            )?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let config = builder
            .add_source(
                env.prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("failed to load configuration")?;

        let raw: RawSettings = config
            .try_deserialize()
            .context("invalid configuration")?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawSettings) -> Result<Self> {
        if raw.stream.history_capacity == 0 {
            bail!("stream.history_capacity must be at least 1");
        }

        let endpoint = raw.backend.endpoint.trim_end_matches('/').to_string();
        if endpoint.is_empty() {
            bail!("backend.endpoint must not be empty");
        }

        Ok(Self {
            backend: BackendSettings {
                endpoint,
                token: raw.backend.token.filter(|t| !t.is_empty()),
                token_in_query: raw.backend.token_in_query,
                timeout: duration("backend.timeout", &raw.backend.timeout)?,
                connect_timeout: duration("backend.connect_timeout", &raw.backend.connect_timeout)?,
            },
            stream: StreamSettings {
                retry_delay: duration("stream.retry_delay", &raw.stream.retry_delay)?,
                history_capacity: raw.stream.history_capacity,
            },
        })
    }

    /// Options for every stream opened with these settings.
    pub fn stream_options(&self) -> StreamOptions {
        StreamOptions {
            retry_delay: self.stream.retry_delay,
            history_capacity: self.stream.history_capacity,
            ..StreamOptions::default()
        }
    }

    /// Build the HTTP adapter for the configured backend.
    #[cfg(feature = "http")]
    pub fn backend_adapter(&self) -> Result<appwatch_adapters::backend::BackendAdapter> {
        let adapter = appwatch_adapters::backend::BackendAdapter::builder()
            .endpoint(self.backend.endpoint.as_str())
            .timeout(self.backend.timeout)
            .connect_timeout(self.backend.connect_timeout)
            .token_in_query(self.backend.token_in_query)
            .build()?;
        Ok(adapter)
    }
}

fn duration(key: &str, value: &str) -> Result<Duration> {
    parse_duration(value).with_context(|| format!("invalid duration for {}", key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    /// Environment source fed from a map instead of the process environment.
    fn fake_env(vars: &[(&str, &str)]) -> Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::with_prefix(ENV_PREFIX).source(Some(map))
    }

    fn write_toml(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults() {
        let settings = Settings::build(None, fake_env(&[])).unwrap();

        assert_eq!(settings.backend.endpoint, "http://127.0.0.1:8000");
        assert_eq!(settings.backend.token, None);
        assert!(settings.backend.token_in_query);
        assert_eq!(settings.backend.timeout, Duration::from_secs(10));
        assert_eq!(settings.backend.connect_timeout, Duration::from_secs(5));
        assert_eq!(settings.stream.retry_delay, Duration::from_secs(5));
        assert_eq!(settings.stream.history_capacity, 20);
    }

    #[test]
    fn file_overrides_defaults() {
        let file = write_toml(
            r#"
[backend]
endpoint = "https://metrics.example.com/"
token = "abc"
token_in_query = false

[stream]
retry_delay = "500ms"
history_capacity = 50
"#,
        );

        let settings = Settings::build(Some(file.path()), fake_env(&[])).unwrap();
        assert_eq!(settings.backend.endpoint, "https://metrics.example.com");
        assert_eq!(settings.backend.token.as_deref(), Some("abc"));
        assert!(!settings.backend.token_in_query);
        assert_eq!(settings.stream.retry_delay, Duration::from_millis(500));
        assert_eq!(settings.stream.history_capacity, 50);

        let options = settings.stream_options();
        assert_eq!(options.retry_delay, Duration::from_millis(500));
        assert!(options.seed);
    }

    #[test]
    fn environment_overrides_file() {
        let file = write_toml("[stream]\nretry_delay = \"1s\"\n");
        let env = fake_env(&[
            ("APPWATCH_STREAM__RETRY_DELAY", "2s"),
            ("APPWATCH_BACKEND__TOKEN", "from-env"),
        ]);

        let settings = Settings::build(Some(file.path()), env).unwrap();
        assert_eq!(settings.stream.retry_delay, Duration::from_secs(2));
        assert_eq!(settings.backend.token.as_deref(), Some("from-env"));
    }

    #[test]
    fn rejects_bad_values() {
        let file = write_toml("[stream]\nretry_delay = \"soon\"\n");
        let err = Settings::build(Some(file.path()), fake_env(&[])).unwrap_err();
        assert!(format!("{:#}", err).contains("stream.retry_delay"));

        let file = write_toml("[stream]\nhistory_capacity = 0\n");
        assert!(Settings::build(Some(file.path()), fake_env(&[])).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(Settings::build(Some(&path), fake_env(&[])).is_err());
    }
}
