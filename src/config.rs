//! Server configuration. Fixed limits live here as constants; everything an
//! operator may change is parsed into [`Settings`] from an optional TOML file
//! and `OCR_*` environment variables.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

/// Default tracing directive when `RUST_LOG` is unset
pub const RUST_LOG: &str = "info,actix_web=info";

/// Config file read when no path is given on the command line
pub const DEFAULT_CONFIG_FILE: &str = "ocr-server.toml";

/// Prefix for environment overrides, e.g. `OCR_REMOTE__API_KEY`
pub const ENV_PREFIX: &str = "OCR";

/// Maximum accepted upload size (16 MiB)
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Accepted image file extensions, compared case-insensitively
pub const ALLOWED_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "bmp"];

/// Language hint used when the request does not carry one
pub const DEFAULT_LANGUAGE: &str = "vie+eng";

/// Name of the local engine executable looked up on `PATH`
pub const ENGINE_BINARY: &str = "tesseract";

/// Install locations tried when the engine is not on `PATH`
pub const ENGINE_FALLBACK_PATHS: [&str; 2] = [
    r"C:\Program Files\Tesseract-OCR\tesseract.exe",
    "/usr/bin/tesseract",
];

/// OCR.space parse endpoint
pub const REMOTE_ENDPOINT: &str = "https://api.ocr.space/parse/image";

/// Hard timeout for one remote recognition call
pub const REMOTE_TIMEOUT_SECONDS: u64 = 30;

/// OCR.space engine selector
pub const REMOTE_ENGINE: u8 = 2;

/// Which recognition backend the server forwards to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// A locally installed engine executable
    Local,

    /// The OCR.space web API
    Remote,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocalSettings {
    /// Explicit path to the engine executable. Skips all probing when set.
    pub binary: Option<PathBuf>,
    pub fallback_paths: Vec<PathBuf>,
}

impl Default for LocalSettings {
    fn default() -> Self {
        LocalSettings {
            binary: None,
            fallback_paths: ENGINE_FALLBACK_PATHS.iter().map(PathBuf::from).collect(),
        }
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct RemoteSettings {
    pub api_key: Option<String>,
    pub endpoint: String,
    pub timeout_seconds: u64,
    pub engine: u8,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        RemoteSettings {
            api_key: None,
            endpoint: REMOTE_ENDPOINT.to_string(),
            timeout_seconds: REMOTE_TIMEOUT_SECONDS,
            engine: REMOTE_ENGINE,
        }
    }
}

// Keep the credential out of logs
impl fmt::Debug for RemoteSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("endpoint", &self.endpoint)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("engine", &self.engine)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub default_language: String,
    pub backend: BackendKind,
    pub local: LocalSettings,
    pub remote: RemoteSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            host: "0.0.0.0".to_string(),
            port: 5000,
            default_language: DEFAULT_LANGUAGE.to_string(),
            backend: BackendKind::Local,
            local: LocalSettings::default(),
            remote: RemoteSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from `path` (if it exists) overlaid with `OCR_*`
    /// environment variables
    pub fn load(path: &str) -> Result<Self> {
        let source = ::config::Config::builder()
            .add_source(::config::File::with_name(path).required(false))
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("failed to read configuration from {path}"))?;

        let settings: Settings = source
            .try_deserialize()
            .context("invalid configuration")?;
        settings.validate()?;

        Ok(settings)
    }

    /// Reject combinations that cannot serve requests
    pub fn validate(&self) -> Result<()> {
        if self.backend == BackendKind::Remote {
            match self.remote.api_key.as_deref() {
                Some(key) if !key.trim().is_empty() => {}
                _ => bail!(
                    "backend = \"remote\" requires remote.api_key (or {ENV_PREFIX}_REMOTE__API_KEY)"
                ),
            }
            if self.remote.timeout_seconds == 0 {
                bail!("remote.timeout_seconds must be greater than zero");
            }
        }
        Ok(())
    }
}
