use crate::{packager::Mode, sites::SiteTable};
use anyhow::Context;
use std::{net::IpAddr, path::PathBuf, str::FromStr, time::Duration};

const DEFAULT_SITES: &str = "instagram.com,x.com,twitter.com,tiktok.com";

/// Process-wide settings, read once from the environment at start-up.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub base_temp: PathBuf,
    pub extractor_bin: String,
    pub extractor_extra_args: Vec<String>,
    pub download_timeout: Duration,
    pub fetch_timeout: Duration,
    pub default_mode: Mode,
    pub sites: SiteTable,
    pub supported_sites_only: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        let config = Self {
            host: parse_or(&var, "TOOLSERVER_HOST", IpAddr::from([127, 0, 0, 1]))?,
            port: parse_or(&var, "TOOLSERVER_PORT", 6791)?,
            base_temp: var("BASE_TEMP")
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join("galleryjob")),
            extractor_bin: var("EXTRACTOR_BIN").unwrap_or_else(|| "gallery-dl".to_string()),
            extractor_extra_args: var("EXTRACTOR_EXTRA_ARGS")
                .map(|v| v.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
            download_timeout: Duration::from_secs(parse_or(&var, "EXTRACT_TIMEOUT_SECS", 120)?),
            fetch_timeout: Duration::from_secs(parse_or(&var, "FETCH_TIMEOUT_SECS", 60)?),
            default_mode: parse_or(&var, "DOWNLOAD_MODE", Mode::Single)?,
            sites: SiteTable::parse(&var("SITE_PROFILES").unwrap_or_else(|| DEFAULT_SITES.to_string()))
                .context("invalid SITE_PROFILES")?,
            supported_sites_only: parse_or(&var, "SUPPORTED_SITES_ONLY", false)?,
        };

        if config.download_timeout.is_zero() || config.fetch_timeout.is_zero() {
            anyhow::bail!("extraction timeouts must be greater than zero");
        }
        Ok(config)
    }
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {key}={raw:?}: {e}")),
        None => Ok(default),
    }
}
