//! API-wide settings, optionally read from the environment.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const DEFAULT_MAX_PAGE_SIZE: u32 = 100;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub title: String,
    pub version: String,
    /// Mount point of resource routes, e.g. "/api".
    pub prefix: String,
    pub default_page_size: u32,
    pub max_page_size: u32,
    /// Requests per period per client and resource; 0 disables limiting.
    pub rate_limit: u32,
    pub rate_limit_period_secs: u64,
    pub max_body_bytes: usize,
}

impl Default for ApiSettings {
    fn default() -> Self {
        ApiSettings {
            title: "Resource API".into(),
            version: "1.0.0".into(),
            prefix: "/api".into(),
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            rate_limit: 0,
            rate_limit_period_secs: 60,
            max_body_bytes: 1024 * 1024,
        }
    }
}

impl ApiSettings {
    /// Defaults overridden by `RESOURCE_*` env vars. Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        let mut s = ApiSettings::default();
        if let Ok(v) = std::env::var("RESOURCE_API_TITLE") {
            s.title = v;
        }
        if let Ok(v) = std::env::var("RESOURCE_API_PREFIX") {
            s.prefix = v;
        }
        env_parse("RESOURCE_DEFAULT_PAGE_SIZE", &mut s.default_page_size);
        env_parse("RESOURCE_MAX_PAGE_SIZE", &mut s.max_page_size);
        env_parse("RESOURCE_RATE_LIMIT", &mut s.rate_limit);
        env_parse("RESOURCE_RATE_LIMIT_PERIOD", &mut s.rate_limit_period_secs);
        env_parse("RESOURCE_MAX_BODY_BYTES", &mut s.max_body_bytes);
        s
    }
}

fn env_parse<T: FromStr>(key: &str, slot: &mut T) {
    if let Ok(raw) = std::env::var(key) {
        match raw.parse() {
            Ok(v) => *slot = v,
            Err(_) => tracing::warn!(key, value = %raw, "ignoring unparseable setting"),
        }
    }
}
