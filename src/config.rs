use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;

pub const DATA_DIR_ENV: &str = "MANGAWATCH_DATA_DIR";
pub const TIMEOUT_ENV: &str = "MANGAWATCH_TIMEOUT_SECS";
pub const USER_AGENT_ENV: &str = "MANGAWATCH_USER_AGENT";

const DEFAULT_DATA_DIR: &str = "mangawatch-data";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Resolves the data directory: explicit flag, then env, then `./mangawatch-data`.
pub fn resolve_data_dir(flag: Option<&str>) -> PathBuf {
    if let Some(dir) = flag.filter(|dir| !dir.trim().is_empty()) {
        return PathBuf::from(dir);
    }
    match std::env::var(DATA_DIR_ENV) {
        Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
        _ => PathBuf::from(DEFAULT_DATA_DIR),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: format!("mangawatch/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl FetchConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let timeout = std::env::var(TIMEOUT_ENV).ok();
        let user_agent = std::env::var(USER_AGENT_ENV).ok();
        Self::from_values(timeout.as_deref(), user_agent.as_deref())
    }

    pub fn from_values(timeout: Option<&str>, user_agent: Option<&str>) -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Some(raw) = timeout {
            let secs = parse_timeout_secs(raw)
                .with_context(|| format!("invalid {TIMEOUT_ENV}={raw:?}"))?;
            config.timeout = Duration::from_secs(secs);
        }

        if let Some(raw) = user_agent {
            let raw = raw.trim();
            if raw.is_empty() {
                anyhow::bail!("{USER_AGENT_ENV} is empty");
            }
            config.user_agent = raw.to_owned();
        }

        Ok(config)
    }
}

fn parse_timeout_secs(raw: &str) -> anyhow::Result<u64> {
    let secs: u64 = raw.trim().parse().context("parse seconds")?;
    if secs == 0 {
        anyhow::bail!("timeout must be at least one second");
    }
    Ok(secs)
}
