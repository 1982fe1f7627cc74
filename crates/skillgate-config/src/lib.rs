//! Process configuration for the skillgate server.
//!
//! Settings are read once at startup from the environment (a `.env` file is
//! loaded by the binary beforehand) and then shared read-only:
//!
//! - [`Settings`] - Complete server configuration
//! - [`Backend`] - Which upstream agent implementation to use
//! - [`ApiKeyFormat`] - Diagnostic classification of the credential
//!
//! # Loading
//!
//! ```rust
//! use std::collections::HashMap;
//! use skillgate_config::{Backend, Settings};
//!
//! let env = HashMap::from([
//!     ("ANTHROPIC_API_KEY", "sk-ant-REDACTED"),
//!     ("PORT", "8080"),
//! ]);
//! let settings = Settings::from_lookup(|key| env.get(key).map(|v| v.to_string())).unwrap();
//!
//! assert_eq!(settings.port, 8080);
//! assert_eq!(settings.backend, Backend::Api);
//! ```

use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

/// Expected prefix of an Anthropic API key.
pub const API_KEY_PREFIX: &str = "sk-ant-";

/// Keys shorter than this are reported as malformed.
pub const API_KEY_MIN_LEN: usize = 20;

/// Errors that can occur when loading the configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The upstream credential is not set.
    #[error("ANTHROPIC_API_KEY environment variable is required")]
    MissingApiKey,

    /// A variable is set but cannot be parsed.
    #[error("Invalid value '{value}' for {var}: {reason}")]
    Invalid {
        var: String,
        value: String,
        reason: String,
    },

    /// Host and port do not form a socket address.
    #[error("Invalid listen address '{0}'")]
    Address(String),
}

impl ConfigError {
    fn invalid(var: &str, value: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            var: var.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Upstream agent implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Agent loop against the Anthropic Messages API with the local tool registry.
    #[default]
    Api,
    /// The Claude CLI in stream-json mode.
    Cli,
}

impl FromStr for Backend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "api" => Ok(Self::Api),
            "cli" => Ok(Self::Cli),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Api => "api",
            Self::Cli => "cli",
        };
        write!(f, "{}", s)
    }
}

/// Classification of the configured credential, safe to expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiKeyFormat {
    Valid,
    Missing,
    Empty,
    TooShort,
    BadPrefix,
}

impl ApiKeyFormat {
    pub fn check(key: Option<&str>) -> Self {
        match key.map(str::trim) {
            None => Self::Missing,
            Some("") => Self::Empty,
            Some(k) if k.len() < API_KEY_MIN_LEN => Self::TooShort,
            Some(k) if !k.starts_with(API_KEY_PREFIX) => Self::BadPrefix,
            Some(_) => Self::Valid,
        }
    }

    pub fn is_valid(self) -> bool {
        self == Self::Valid
    }
}

/// Complete server configuration.
#[derive(Clone)]
pub struct Settings {
    /// Upstream credential. Required at startup; `None` only in tests.
    pub api_key: Option<String>,
    pub host: String,
    pub port: u16,
    pub backend: Backend,
    pub model: String,
    /// Maximum agent turns per request.
    pub max_turns: u32,
    /// Executable used by the CLI backend.
    pub cli_path: PathBuf,
    /// Project skill descriptions. When it sits at `<root>/.claude/skills`,
    /// the agent runs in `<root>` so project settings pick the skills up.
    pub skills_dir: PathBuf,
    pub keepalive_interval: Duration,
    pub stream_by_default: bool,
    pub static_index: PathBuf,
    pub cors_enabled: bool,
    pub health_diagnostics: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            host: "0.0.0.0".to_string(),
            port: 3000,
            backend: Backend::Api,
            model: "claude-sonnet-4-5".to_string(),
            max_turns: 10,
            cli_path: PathBuf::from("claude"),
            skills_dir: PathBuf::from(".claude/skills"),
            keepalive_interval: Duration::from_secs(10),
            stream_by_default: true,
            static_index: PathBuf::from("public/index.html"),
            cors_enabled: true,
            health_diagnostics: true,
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("backend", &self.backend)
            .field("model", &self.model)
            .field("max_turns", &self.max_turns)
            .field("cli_path", &self.cli_path)
            .field("skills_dir", &self.skills_dir)
            .field("keepalive_interval", &self.keepalive_interval)
            .field("stream_by_default", &self.stream_by_default)
            .field("static_index", &self.static_index)
            .field("cors_enabled", &self.cors_enabled)
            .field("health_diagnostics", &self.health_diagnostics)
            .finish()
    }
}

impl Settings {
    /// Loads settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_key = lookup("ANTHROPIC_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let backend = match lookup("SKILLGATE_BACKEND") {
            Some(v) => v
                .parse()
                .map_err(|_| ConfigError::invalid("SKILLGATE_BACKEND", &v, "expected 'api' or 'cli'"))?,
            None => defaults.backend,
        };

        let keepalive_secs: u64 = parse_var(&lookup, "SKILLGATE_KEEPALIVE_SECS")?
            .unwrap_or(defaults.keepalive_interval.as_secs());
        if keepalive_secs == 0 {
            return Err(ConfigError::invalid(
                "SKILLGATE_KEEPALIVE_SECS",
                "0",
                "interval must be at least one second",
            ));
        }

        Ok(Self {
            api_key: Some(api_key),
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_var(&lookup, "PORT")?.unwrap_or(defaults.port),
            backend,
            model: lookup("SKILLGATE_MODEL").unwrap_or(defaults.model),
            max_turns: parse_var(&lookup, "SKILLGATE_MAX_TURNS")?.unwrap_or(defaults.max_turns),
            cli_path: lookup("SKILLGATE_CLI_PATH").map(PathBuf::from).unwrap_or(defaults.cli_path),
            skills_dir: lookup("SKILLGATE_SKILLS_DIR").map(PathBuf::from).unwrap_or(defaults.skills_dir),
            keepalive_interval: Duration::from_secs(keepalive_secs),
            stream_by_default: parse_bool(&lookup, "SKILLGATE_STREAM_DEFAULT")?
                .unwrap_or(defaults.stream_by_default),
            static_index: lookup("SKILLGATE_STATIC_INDEX")
                .map(PathBuf::from)
                .unwrap_or(defaults.static_index),
            cors_enabled: parse_bool(&lookup, "SKILLGATE_CORS")?.unwrap_or(defaults.cors_enabled),
            health_diagnostics: parse_bool(&lookup, "SKILLGATE_HEALTH_DIAGNOSTICS")?
                .unwrap_or(defaults.health_diagnostics),
        })
    }

    /// Returns the address the listener binds to.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse().map_err(|_| ConfigError::Address(addr))
    }

    pub fn api_key_format(&self) -> ApiKeyFormat {
        ApiKeyFormat::check(self.api_key.as_deref())
    }

    /// Project root that owns `skills_dir`, if it follows the
    /// `<root>/.claude/skills` layout and is not the current directory.
    pub fn project_dir(&self) -> Option<&Path> {
        if !self.skills_dir.ends_with(".claude/skills") {
            return None;
        }
        self.skills_dir
            .parent()
            .and_then(Path::parent)
            .filter(|root| !root.as_os_str().is_empty())
    }
}

fn parse_var<F, T>(lookup: &F, var: &str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    lookup(var)
        .map(|v| {
            v.trim()
                .parse()
                .map_err(|e: T::Err| ConfigError::invalid(var, &v, e.to_string()))
        })
        .transpose()
}

fn parse_bool<F>(lookup: &F, var: &str) -> Result<Option<bool>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var)
        .map(|v| match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::invalid(var, &v, "expected a boolean")),
        })
        .transpose()
}
