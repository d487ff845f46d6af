use crate::errors::{Error, Result};
use crate::ipinfo::DEFAULT_API_URL;
use std::env;
use std::str::FromStr;

const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(Error::Config(format!("unknown LOG_FORMAT {:?}", other))),
        }
    }
}

/// Service settings read from the environment
#[derive(Debug, Clone)]
pub struct Config {
    pub http_addr: String,
    /// Entries stay in process memory when unset.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    /// Geolocation endpoint, `{ip}` is replaced by the address.
    pub geoip_api_url: String,
    pub geoip_token: Option<String>,
    /// Write geolocation found while answering range queries back to the store.
    pub backfill_on_read: bool,
    pub log_format: LogFormat,
}

impl Config {
    /// Reads the process environment, after loading `.env` if one exists.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let http_addr = match (var("HTTP_ADDR"), var("PORT")) {
            (Some(addr), _) => addr,
            (None, Some(port)) => format!("0.0.0.0:{}", parse::<u16>("PORT", &port)?),
            (None, None) => DEFAULT_HTTP_ADDR.to_string(),
        };

        let db_max_connections = match var("DB_MAX_CONNECTIONS") {
            Some(v) => parse("DB_MAX_CONNECTIONS", &v)?,
            None => DEFAULT_DB_MAX_CONNECTIONS,
        };

        let geoip_api_url = var("GEOIP_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        if !geoip_api_url.contains("{ip}") {
            return Err(Error::Config(
                "GEOIP_API_URL must contain an {ip} placeholder".to_string(),
            ));
        }

        let backfill_on_read = match var("BACKFILL_ON_READ") {
            Some(v) => parse_bool("BACKFILL_ON_READ", &v)?,
            None => true,
        };

        let log_format = match var("LOG_FORMAT") {
            Some(v) => v.parse()?,
            None => LogFormat::Text,
        };

        Ok(Self {
            http_addr,
            database_url: var("DATABASE_URL"),
            db_max_connections,
            geoip_api_url,
            geoip_token: var("IPINFO_TOKEN"),
            backfill_on_read,
            log_format,
        })
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("invalid value for {}: {:?}", key, value)))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!("invalid value for {}: {:?}", key, value))),
    }
}
