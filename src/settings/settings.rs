use anyhow::{Result, anyhow};
use config::{Config, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub backend: Backend,
    pub cache: Cache,
    pub http: Http,
    pub jwt: Jwt,
    pub log: Log,
    pub session: Session,
}

#[derive(Debug, Deserialize)]
pub struct Backend {
    pub kind: String, // "memory" or "redis"
    pub redis_url: Option<String>,
    pub key_prefix: String,
}

#[derive(Debug, Deserialize)]
pub struct Cache {
    pub ids_ttl_secs: u64,
    pub records_ttl_secs: u64,
    pub page_size: u16,
    pub fetch_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct Http {
    pub address: String,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Jwt {
    pub issuer: String,
    pub audience: String,
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

#[derive(Debug, Deserialize)]
pub struct Session {
    pub revalidate_window_secs: u64,
    pub refresh_margin_secs: u64,
    pub recheck_interval_secs: u64,
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    Ok(settings)
}
