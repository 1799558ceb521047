use anyhow::{Context, Result, anyhow};
use std::{
    collections::HashMap,
    env, fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use crate::trends::{BucketPolicy, DEFAULT_ROLLING_WINDOW, TrendsConfig, WindowDirection};
use crate::youtube::DEFAULT_API_BASE_URL;

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const DEFAULT_DB_PATH: &str = "data/yt_insights.db";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_FETCH_DEADLINE_SECS: u64 = 300;

#[derive(Clone)]
pub struct Settings {
    pub api_key: String,
    pub api_base_url: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    /// Applied to every single provider request.
    pub request_timeout: Duration,
    /// Applied to a whole multi-request fetch.
    pub fetch_deadline: Duration,
    pub trends: TrendsConfig,
}

impl Settings {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("api_key", &mask_secret(&self.api_key))
            .field("api_base_url", &self.api_base_url)
            .field("db_path", &self.db_path)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("request_timeout", &self.request_timeout)
            .field("fetch_deadline", &self.fetch_deadline)
            .field("trends", &self.trends)
            .finish()
    }
}

/// Keeps the first four characters of a secret for log correlation.
pub fn mask_secret(secret: &str) -> String {
    if secret.chars().count() <= 8 {
        return "****".to_string();
    }
    let prefix: String = secret.chars().take(4).collect();
    format!("{prefix}****")
}

/// Values taken from command-line flags; they win over everything else.
#[derive(Debug, Clone, Default)]
pub struct RuntimeOverrides {
    pub env_path: Option<PathBuf>,
    pub db_path: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

pub fn load_settings() -> Result<Settings> {
    resolve_settings(RuntimeOverrides::default())
}

/// Merges overrides, the process environment, the env file and defaults,
/// in that order of priority.
pub fn resolve_settings(overrides: RuntimeOverrides) -> Result<Settings> {
    let env_path = overrides
        .env_path
        .as_deref()
        .unwrap_or_else(|| Path::new(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(env_path)?;
    build_settings(&file_vars, env_var_string, overrides)
}

fn build_settings(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: RuntimeOverrides,
) -> Result<Settings> {
    let lookup = |key: &str| lookup_value(key, file_vars, &env_lookup);

    let api_key = lookup("YOUTUBE_API_KEY").ok_or_else(|| anyhow!("YOUTUBE_API_KEY not set"))?;
    let api_base_url = lookup("YOUTUBE_API_BASE_URL")
        .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
    let db_path = overrides
        .db_path
        .or_else(|| lookup("DB_PATH").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));
    let host = overrides
        .host
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .or_else(|| lookup("HOST"))
        .unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = overrides
        .port
        .unwrap_or_else(|| parsed_or("PORT", lookup("PORT"), DEFAULT_PORT));

    let request_timeout = positive_or(
        "REQUEST_TIMEOUT_SECS",
        lookup("REQUEST_TIMEOUT_SECS"),
        DEFAULT_REQUEST_TIMEOUT_SECS,
    );
    let fetch_deadline = positive_or(
        "FETCH_DEADLINE_SECS",
        lookup("FETCH_DEADLINE_SECS"),
        DEFAULT_FETCH_DEADLINE_SECS,
    );

    let rolling_window = positive_or(
        "TRENDS_ROLLING_WINDOW",
        lookup("TRENDS_ROLLING_WINDOW"),
        DEFAULT_ROLLING_WINDOW as u64,
    );
    let direction = enum_or(
        "TRENDS_WINDOW_DIRECTION",
        lookup("TRENDS_WINDOW_DIRECTION"),
        WindowDirection::parse,
    );
    let buckets = enum_or("TRENDS_BUCKETS", lookup("TRENDS_BUCKETS"), BucketPolicy::parse);

    Ok(Settings {
        api_key,
        api_base_url,
        db_path,
        host,
        port,
        request_timeout: Duration::from_secs(request_timeout),
        fetch_deadline: Duration::from_secs(fetch_deadline),
        trends: TrendsConfig {
            rolling_window: usize::try_from(rolling_window).unwrap_or(DEFAULT_ROLLING_WINDOW),
            direction,
            buckets,
        },
    })
}

fn parsed_or<T: FromStr>(key: &str, raw: Option<String>, default: T) -> T {
    let Some(raw) = raw else {
        return default;
    };
    match raw.parse::<T>() {
        Ok(value) => value,
        Err(_) => {
            log::warn!("{key}={raw:?} is not valid; using the default");
            default
        }
    }
}

fn positive_or(key: &str, raw: Option<String>, default: u64) -> u64 {
    match parsed_or(key, raw, default) {
        0 => {
            log::warn!("{key} must be positive; using {default}");
            default
        }
        value => value,
    }
}

fn enum_or<T: Default>(key: &str, raw: Option<String>, parse: impl Fn(&str) -> Option<T>) -> T {
    let Some(raw) = raw else {
        return T::default();
    };
    parse(&raw).unwrap_or_else(|| {
        log::warn!("{key}={raw:?} is not recognised; using the default");
        T::default()
    })
}

fn env_var_string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key).or_else(|| {
        file_vars
            .get(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

/// Parses `KEY=value` lines. `export` prefixes, surrounding quotes, blank
/// lines and `#` comments are accepted. A missing file yields no values.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    if !path.exists() {
        return Ok(vars);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        let Some((key, raw_value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        vars.insert(key.to_string(), unquote(raw_value.trim()).to_string());
    }
    Ok(vars)
}

fn unquote(value: &str) -> &str {
    ['"', '\'']
        .iter()
        .find_map(|quote| {
            value
                .strip_prefix(*quote)
                .and_then(|inner| inner.strip_suffix(*quote))
        })
        .unwrap_or(value)
}
