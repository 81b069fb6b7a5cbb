// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use log::LevelFilter;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_VERSION: i64 = 1;
const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api";
const DEFAULT_API_TIMEOUT: &str = "10s";
const DEFAULT_DRAFT_TTL_DAYS: i64 = 30;
const DEFAULT_LOG_LEVEL: &str = "info";
const LOG_FILE_NAME: &str = "hireboard.log";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub api: Api,
    #[serde(default)]
    pub ui: Ui,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            storage: Storage::default(),
            api: Api::default(),
            ui: Ui::default(),
            log: Log::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
    pub db_path: Option<String>,
    pub draft_ttl_days: Option<i64>,
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            db_path: None,
            draft_ttl_days: Some(DEFAULT_DRAFT_TTL_DAYS),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Api {
    pub base_url: Option<String>,
    pub timeout: Option<String>,
}

impl Default for Api {
    fn default() -> Self {
        Self {
            base_url: Some(DEFAULT_API_BASE_URL.to_owned()),
            timeout: Some(DEFAULT_API_TIMEOUT.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ui {
    pub page_size: Option<u32>,
}

impl Default for Ui {
    fn default() -> Self {
        Self {
            page_size: Some(hireboard_app::DEFAULT_PAGE_SIZE),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Log {
    pub path: Option<String>,
    pub level: Option<String>,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("HIREBOARD_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!(
                "cannot resolve config directory; set HIREBOARD_CONFIG_PATH to the config file"
            )
        })?;

        let app_dir = config_root.join(hireboard_db::APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} has no version. Add `version = 1` and put values under [storage], [api], [ui], and [log]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(db_path) = &self.storage.db_path {
            hireboard_db::validate_db_path(db_path)?;
        }

        if let Some(ttl_days) = self.storage.draft_ttl_days
            && ttl_days < 0
        {
            bail!(
                "storage.draft_ttl_days in {} must be non-negative, got {}",
                path.display(),
                ttl_days
            );
        }

        if let Some(base_url) = &self.api.base_url
            && !(base_url.starts_with("http://") || base_url.starts_with("https://"))
        {
            bail!(
                "api.base_url in {} must start with http:// or https://, got {:?}",
                path.display(),
                base_url
            );
        }

        if let Some(timeout) = &self.api.timeout {
            let parsed = parse_duration(timeout)?;
            if parsed <= Duration::ZERO {
                bail!(
                    "api.timeout in {} must be positive, got {}",
                    path.display(),
                    timeout
                );
            }
        }

        if self.ui.page_size == Some(0) {
            bail!("ui.page_size in {} must be at least 1", path.display());
        }

        if let Some(level) = &self.log.level {
            parse_level(level).with_context(|| format!("invalid log.level in {}", path.display()))?;
        }

        Ok(())
    }

    pub fn db_path(&self) -> Result<PathBuf> {
        match &self.storage.db_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => hireboard_db::default_db_path(),
        }
    }

    pub fn draft_ttl_days(&self) -> i64 {
        self.storage.draft_ttl_days.unwrap_or(DEFAULT_DRAFT_TTL_DAYS)
    }

    pub fn api_base_url(&self) -> &str {
        self.api
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_API_BASE_URL)
            .trim_end_matches('/')
    }

    pub fn api_timeout(&self) -> Result<Duration> {
        parse_duration(self.api.timeout.as_deref().unwrap_or(DEFAULT_API_TIMEOUT))
    }

    pub fn page_size(&self) -> u32 {
        self.ui
            .page_size
            .unwrap_or(hireboard_app::DEFAULT_PAGE_SIZE)
    }

    pub fn log_level(&self) -> Result<LevelFilter> {
        parse_level(self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL))
    }

    /// Log file next to the database unless `[log].path` says otherwise.
    pub fn log_path(&self, db_path: &Path) -> PathBuf {
        if let Some(path) = &self.log.path {
            return PathBuf::from(path);
        }
        match db_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.join(LOG_FILE_NAME),
            _ => env::temp_dir().join(LOG_FILE_NAME),
        }
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# hireboard config\n# Place this file at: {}\n\nversion = 1\n\n[storage]\n# Optional. Default is platform data dir (for example ~/.local/share/hireboard/hireboard.db)\n# db_path = \"/absolute/path/to/hireboard.db\"\n# Unsaved drafts and list settings untouched this long are dropped at startup.\ndraft_ttl_days = {}\n\n[api]\nbase_url = \"{}\"\ntimeout = \"{}\"\n\n[ui]\npage_size = {}\n\n[log]\n# Optional. Default is hireboard.log next to the database.\n# path = \"/absolute/path/to/hireboard.log\"\nlevel = \"{}\"\n",
            path.display(),
            DEFAULT_DRAFT_TTL_DAYS,
            DEFAULT_API_BASE_URL,
            DEFAULT_API_TIMEOUT,
            hireboard_app::DEFAULT_PAGE_SIZE,
            DEFAULT_LOG_LEVEL,
        )
    }
}

fn parse_level(raw: &str) -> Result<LevelFilter> {
    raw.parse::<LevelFilter>().map_err(|_| {
        anyhow!("unknown log level {raw:?}; use one of: off, error, warn, info, debug, trace")
    })
}

fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(mins * 60));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 5s)")
}
