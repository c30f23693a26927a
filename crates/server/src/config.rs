use std::{collections::HashMap, fs, time::Duration};

use anyhow::{bail, Context};
use serde::Deserialize;
use url::Url;

/// Raw settings as layered from defaults, the optional config file, and
/// environment variables. Validation happens separately so missing
/// required values fail at startup with a clear message.
#[derive(Debug, Deserialize)]
pub struct Settings {
    pub bind_addr: String,
    pub upstream_base_url: Option<String>,
    pub secret_key: Option<String>,
    pub session_ttl_seconds: u64,
    pub upstream_timeout_seconds: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".into(),
            upstream_base_url: None,
            secret_key: None,
            session_ttl_seconds: 8 * 60 * 60,
            upstream_timeout_seconds: 30,
        }
    }
}

/// Settings after the fail-fast startup check: the upstream base URL and
/// the cookie secret are mandatory, everything else has defaults.
#[derive(Debug, Clone)]
pub struct ValidatedSettings {
    pub bind_addr: String,
    pub upstream_base_url: String,
    pub secret_key: String,
    pub session_ttl: Duration,
    pub upstream_timeout: Duration,
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("campus-front.toml") {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, toml::Value>>(&raw) {
            if let Some(v) = file_cfg.get("bind_addr").and_then(|v| v.as_str()) {
                settings.bind_addr = v.to_string();
            }
            if let Some(v) = file_cfg.get("upstream_base_url").and_then(|v| v.as_str()) {
                settings.upstream_base_url = Some(v.to_string());
            }
            if let Some(v) = file_cfg.get("secret_key").and_then(|v| v.as_str()) {
                settings.secret_key = Some(v.to_string());
            }
            if let Some(v) = file_cfg.get("session_ttl_seconds").and_then(|v| v.as_integer()) {
                settings.session_ttl_seconds = v.max(0) as u64;
            }
            if let Some(v) = file_cfg
                .get("upstream_timeout_seconds")
                .and_then(|v| v.as_integer())
            {
                settings.upstream_timeout_seconds = v.max(0) as u64;
            }
        }
    }

    if let Ok(v) = std::env::var("CAMPUS_BIND") {
        settings.bind_addr = v;
    }
    if let Ok(v) = std::env::var("CAMPUS_UPSTREAM_URL") {
        settings.upstream_base_url = Some(v);
    }
    if let Ok(v) = std::env::var("CAMPUS_SECRET_KEY") {
        settings.secret_key = Some(v);
    }
    if let Ok(v) = std::env::var("CAMPUS_SESSION_TTL_SECONDS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.session_ttl_seconds = parsed;
        }
    }
    if let Ok(v) = std::env::var("CAMPUS_UPSTREAM_TIMEOUT_SECONDS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.upstream_timeout_seconds = parsed;
        }
    }

    settings
}

/// The deliberate fail-fast boundary: a front-end without an upstream URL
/// or a cookie secret must not start serving requests.
pub fn validate(settings: Settings) -> anyhow::Result<ValidatedSettings> {
    let upstream_base_url = match settings.upstream_base_url {
        Some(raw) if !raw.trim().is_empty() => {
            let raw = raw.trim().trim_end_matches('/').to_string();
            Url::parse(&raw).with_context(|| format!("invalid upstream base url '{raw}'"))?;
            raw
        }
        _ => bail!("upstream base url is not configured (set CAMPUS_UPSTREAM_URL)"),
    };

    let secret_key = match settings.secret_key {
        Some(secret) if !secret.trim().is_empty() => secret,
        _ => bail!("session secret key is not configured (set CAMPUS_SECRET_KEY)"),
    };

    Ok(ValidatedSettings {
        bind_addr: settings.bind_addr,
        upstream_base_url,
        secret_key,
        session_ttl: Duration::from_secs(settings.session_ttl_seconds.max(60)),
        upstream_timeout: Duration::from_secs(settings.upstream_timeout_seconds.clamp(5, 60)),
    })
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
