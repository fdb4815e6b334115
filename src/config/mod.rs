use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use hyper::Method;
use serde::{Deserialize, Deserializer};
use thiserror::Error;
use url::Url;

use crate::formatter::DEFAULT_FORMATTER;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown formatter {name:?} (registered: {})", .known.join(", "))]
    UnknownFormatter { name: String, known: Vec<String> },

    #[error("{0} has invalid value: {1}")]
    InvalidNumeric(String, String),

    #[error("{0} has invalid value: {1} (expected \"true\" or \"false\")")]
    InvalidBool(String, String),

    #[error("invalid HTTP method: {0}")]
    InvalidMethod(String),

    #[error("cannot build endpoint URL from {0}")]
    InvalidEndpoint(String),

    #[error("failed to read config file {path}: {reason}")]
    ConfigFile { path: PathBuf, reason: String },
}

/// The host's configuration object. Only `debug` and the `http` section are
/// read by this backend; everything else is ignored.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub debug: bool,
    pub http: Option<HttpSection>,
}

impl HostConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let file_error = |reason: String| ConfigError::ConfigFile {
            path: path.to_owned(),
            reason,
        };
        let raw = std::fs::read_to_string(path).map_err(|e| file_error(e.to_string()))?;
        serde_json::from_str(&raw).map_err(|e| file_error(e.to_string()))
    }
}

/// Explicit settings. Each one takes precedence over its environment
/// variable, which takes precedence over the built-in default.
///
/// Numeric and boolean settings also accept their string forms
/// (`"port": "8080"`, `"secure": "yes"`).
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HttpSection {
    pub host: Option<String>,
    #[serde(deserialize_with = "lenient_numeric")]
    pub port: Option<u16>,
    pub path: Option<String>,
    pub method: Option<String>,
    pub count_type: Option<String>,
    pub timer_type: Option<String>,
    pub timer_data_type: Option<String>,
    pub gauge_data_type: Option<String>,
    pub formatter: Option<String>,
    #[serde(deserialize_with = "lenient_bool")]
    pub secure: Option<bool>,
    pub ca: Option<PathBuf>,
    #[serde(deserialize_with = "lenient_numeric")]
    pub timeout_ms: Option<u64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Lenient<T> {
    Typed(T),
    Text(String),
}

fn lenient_numeric<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + std::str::FromStr,
{
    use serde::de::Error;

    match Option::<Lenient<T>>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Lenient::Typed(value)) => Ok(Some(value)),
        Some(Lenient::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(Lenient::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("invalid number: {text:?}"))),
    }
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Option::<Lenient<bool>>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Lenient::Typed(value)) => Ok(Some(value)),
        Some(Lenient::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(Lenient::Text(text)) => bool_from_str(&text)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid boolean: {text:?}"))),
    }
}

/// Type label attached to every record of a metric group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeLabels {
    pub counter: String,
    pub timer: String,
    /// Not used to tag the batch (timer statistics carry the timer label);
    /// available to formatters through [`crate::Formatter::init`].
    pub timer_data: String,
    pub gauge: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub endpoint: Url,
    pub method: Method,
    pub secure: bool,
    pub ca: Option<PathBuf>,
    pub labels: TypeLabels,
    pub formatter: String,
    pub timeout: Duration,
    pub debug: bool,
}

impl Config {
    pub fn from_env(host: &HostConfig) -> Result<Self, ConfigError> {
        let vars: HashMap<String, String> = env::vars()
            .filter(|(k, _)| k.starts_with("HTTP_"))
            .collect();
        Self::parse(host, &vars)
    }

    pub fn parse(host: &HostConfig, vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let fallback = HttpSection::default();
        let http = host.http.as_ref().unwrap_or(&fallback);

        let hostname = pick(http.host.as_deref(), vars, "HTTP_HOST", "localhost");
        let port = match http.port {
            Some(port) => port,
            None => parse_numeric(vars, "HTTP_PORT", 8080)?,
        };
        let path = normalize_path(&pick(http.path.as_deref(), vars, "HTTP_PATH", "/"));
        let secure = match http.secure {
            Some(secure) => secure,
            None => parse_bool(vars, "HTTP_SECURE", false)?,
        };
        let endpoint = build_endpoint(secure, &hostname, port, &path)?;
        let method = parse_method(http.method.as_deref().unwrap_or("POST"))?;

        let timer = pick(http.timer_type.as_deref(), vars, "HTTP_TIMER_TYPE", "timer");
        let labels = TypeLabels {
            counter: pick(http.count_type.as_deref(), vars, "HTTP_COUNT_TYPE", "counter"),
            timer_data: pick(
                http.timer_data_type.as_deref(),
                vars,
                "HTTP_TIMER_DATATYPE",
                &format!("{timer}_stats"),
            ),
            gauge: pick(http.gauge_data_type.as_deref(), vars, "HTTP_GAUGE_DATATYPE", "gauge"),
            timer,
        };

        let formatter = pick(http.formatter.as_deref(), vars, "HTTP_FORMATTER", DEFAULT_FORMATTER);
        let timeout = match http.timeout_ms {
            Some(ms) => Duration::from_millis(ms),
            None => Duration::from_millis(parse_numeric(vars, "HTTP_TIMEOUT_MS", 5000)?),
        };

        Ok(Self {
            endpoint,
            method,
            secure,
            ca: http.ca.clone(),
            labels,
            formatter,
            timeout,
            debug: host.debug,
        })
    }
}

/// Explicit value, then environment variable, then default. Empty strings
/// count as unset at every level.
fn pick(explicit: Option<&str>, vars: &HashMap<String, String>, name: &str, default: &str) -> String {
    explicit
        .filter(|s| !s.is_empty())
        .or_else(|| vars.get(name).map(String::as_str).filter(|s| !s.is_empty()))
        .unwrap_or(default)
        .to_owned()
}

fn parse_numeric<T: std::str::FromStr>(
    vars: &HashMap<String, String>,
    name: &str,
    default: T,
) -> Result<T, ConfigError> {
    match vars.get(name).filter(|s| !s.is_empty()) {
        Some(val) => val
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumeric(name.to_owned(), val.clone())),
        None => Ok(default),
    }
}

fn parse_bool(
    vars: &HashMap<String, String>,
    name: &str,
    default: bool,
) -> Result<bool, ConfigError> {
    let Some(val) = vars.get(name).filter(|s| !s.is_empty()) else {
        return Ok(default);
    };
    bool_from_str(val).ok_or_else(|| ConfigError::InvalidBool(name.to_owned(), val.clone()))
}

fn bool_from_str(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn parse_method(raw: &str) -> Result<Method, ConfigError> {
    Method::from_bytes(raw.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| ConfigError::InvalidMethod(raw.to_owned()))
}

fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_owned()
    } else {
        format!("/{path}")
    }
}

fn build_endpoint(secure: bool, host: &str, port: u16, path: &str) -> Result<Url, ConfigError> {
    let scheme = if secure { "https" } else { "http" };
    let base = format!("{scheme}://{host}:{port}");
    let mut url = Url::parse(&base).map_err(|_| ConfigError::InvalidEndpoint(base.clone()))?;
    if url.cannot_be_a_base() || url.host_str().is_none_or(str::is_empty) {
        return Err(ConfigError::InvalidEndpoint(base));
    }

    match path.split_once('?') {
        Some((path, query)) => {
            url.set_path(path);
            url.set_query(Some(query));
        }
        None => url.set_path(path),
    }
    Ok(url)
}
