// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use serde_derive::Deserialize;
use serde_derive::Serialize;

use log::{info, warn};
use std::{fs, time::Duration};

use crate::exception::Exception;

/// 默认配置文件路径，可通过第一个命令行参数覆盖
pub const DEFAULT_CONFIG_PATH: &str = "config/development.toml";

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default = "default_addr")]
    addr: String,
    #[serde(default = "default_dsn")]
    dsn: String,
    #[serde(default)]
    debug: bool,
    #[serde(default)]
    worker_threads: usize,
    #[serde(default = "default_log_config")]
    log_config: String,
    #[serde(default = "default_session_lifetime_secs")]
    session_lifetime_secs: u64,
    #[serde(default = "default_session_cleanup_secs")]
    session_cleanup_secs: u64,
    #[serde(default = "default_secure_cookies")]
    secure_cookies: bool,
    #[serde(default = "default_idle_timeout_secs")]
    idle_timeout_secs: u64,
    #[serde(default = "default_read_timeout_secs")]
    read_timeout_secs: u64,
    #[serde(default = "default_write_timeout_secs")]
    write_timeout_secs: u64,
    #[serde(default = "default_max_body_bytes")]
    max_body_bytes: usize,
    #[serde(default)]
    tls_cert: Option<String>,
    #[serde(default)]
    tls_key: Option<String>,
}

fn default_addr() -> String {
    "127.0.0.1:4000".to_string()
}

fn default_dsn() -> String {
    "sqlite://snippetbox.db?mode=rwc".to_string()
}

fn default_log_config() -> String {
    "config/log4rs.yaml".to_string()
}

fn default_session_lifetime_secs() -> u64 {
    43200 // 12h
}

fn default_session_cleanup_secs() -> u64 {
    300
}

fn default_secure_cookies() -> bool {
    true
}

fn default_idle_timeout_secs() -> u64 {
    60
}

fn default_read_timeout_secs() -> u64 {
    5
}

fn default_write_timeout_secs() -> u64 {
    10
}

fn default_max_body_bytes() -> usize {
    4096
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            addr: default_addr(),
            dsn: default_dsn(),
            debug: false,
            worker_threads: num_cpus::get(),
            log_config: default_log_config(),
            session_lifetime_secs: default_session_lifetime_secs(),
            session_cleanup_secs: default_session_cleanup_secs(),
            secure_cookies: default_secure_cookies(),
            idle_timeout_secs: default_idle_timeout_secs(),
            read_timeout_secs: default_read_timeout_secs(),
            write_timeout_secs: default_write_timeout_secs(),
            max_body_bytes: default_max_body_bytes(),
            tls_cert: None,
            tls_key: None,
        }
    }

    pub fn from_toml(filename: &str) -> Result<Self, Exception> {
        let str_val = fs::read_to_string(filename)
            .map_err(|e| Exception::Config(format!("无法读取配置文件{}：{}", filename, e)))?;
        let config = Self::from_toml_str(&str_val)?;
        info!("配置文件{}已载入", filename);
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, Exception> {
        let mut raw_config: Config =
            toml::from_str(content).map_err(|e| Exception::Config(e.to_string()))?;
        if raw_config.worker_threads == 0 {
            raw_config.worker_threads = num_cpus::get();
        }
        if raw_config.session_lifetime_secs == 0 {
            warn!("session_lifetime_secs被设置为0，会话将立即过期，因此该值将被改为默认值。");
            raw_config.session_lifetime_secs = default_session_lifetime_secs();
        }
        if raw_config.session_cleanup_secs == 0 {
            raw_config.session_cleanup_secs = default_session_cleanup_secs();
        }
        if raw_config.tls_cert.is_some() != raw_config.tls_key.is_some() {
            return Err(Exception::Config("tls_cert与tls_key必须同时设置".to_string()));
        }
        Ok(raw_config)
    }
}

impl Config {
    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn dsn(&self) -> &str {
        &self.dsn
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    pub fn log_config(&self) -> &str {
        &self.log_config
    }

    pub fn session_lifetime(&self) -> Duration {
        Duration::from_secs(self.session_lifetime_secs)
    }

    pub fn session_cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.session_cleanup_secs)
    }

    pub fn secure_cookies(&self) -> bool {
        self.secure_cookies
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    /// 证书与私钥的 PEM 路径，未配置时以明文 HTTP 监听
    pub fn tls(&self) -> Option<(&str, &str)> {
        match (&self.tls_cert, &self.tls_key) {
            (Some(cert), Some(key)) => Some((cert.as_str(), key.as_str())),
            _ => None,
        }
    }
}
