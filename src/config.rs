//! Run settings for both entry points. Defaults come from the constants in `lib.rs`.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Local;

use crate::{
    CH_DATA_DIR, CH_DATA_URL, CH_FTP_HOST, CH_FTP_PORT, CH_FTP_USER, CH_LOG_PATH, CH_TOKEN_PATH, COOLDOWN_SECS,
    MAX_ATTEMPTS, MAX_PAGES, POLL_INTERVAL_MILLIS, RESULT_SETTLE_SECS, SEARCH_SETTLE_SECS,
    SEARCH_URL, WAIT_TIMEOUT_SECS, WEBDRIVER_URL,
};

/// How often one result item is attempted and how long to wait between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub cooldown: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: MAX_ATTEMPTS,
            cooldown: Duration::from_secs(COOLDOWN_SECS),
        }
    }
}

impl RetryPolicy {
    /// Sleeps off the cooldown after failed attempt number `attempt`.
    pub async fn cool_down(&self, attempt: usize) {
        if self.cooldown.is_zero() {
            return;
        }
        log::info!(
            "Cooling down for {} sec after attempt {attempt}/{}",
            self.cooldown.as_secs(),
            self.max_attempts
        );
        tokio::time::sleep(self.cooldown).await;
    }
}

#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub search_url: String,
    pub webdriver_url: String,
    pub headless: bool,
    /// Bound on waiting for a single UI control.
    pub wait_timeout: Duration,
    pub poll_interval: Duration,
    pub search_settle: Duration,
    pub result_settle: Duration,
    /// Fallback and ceiling for the number of results pages.
    pub max_pages: usize,
    pub retry: RetryPolicy,
    pub output_path: PathBuf,
    pub log_path: PathBuf,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        let date = Local::now().format("%Y-%m-%d");
        ScrapeConfig {
            search_url: SEARCH_URL.to_string(),
            webdriver_url: WEBDRIVER_URL.to_string(),
            headless: true,
            wait_timeout: Duration::from_secs(WAIT_TIMEOUT_SECS),
            poll_interval: Duration::from_millis(POLL_INTERVAL_MILLIS),
            search_settle: Duration::from_secs(SEARCH_SETTLE_SECS),
            result_settle: Duration::from_secs(RESULT_SETTLE_SECS),
            max_pages: MAX_PAGES,
            retry: RetryPolicy::default(),
            output_path: PathBuf::from(format!("contracts_data_{date}.csv")),
            log_path: PathBuf::from(format!("contracts_finder_{date}.log")),
        }
    }
}

impl ScrapeConfig {
    /// Defaults, with the WebDriver endpoint taken from `WEBDRIVER_URL` when set.
    pub fn from_env() -> Self {
        let mut config = ScrapeConfig::default();
        if let Ok(url) = std::env::var("WEBDRIVER_URL") {
            if !url.trim().is_empty() {
                config.webdriver_url = url.trim().to_string();
            }
        }
        config
    }
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub data_url: String,
    pub ftp_host: String,
    pub ftp_port: u16,
    pub ftp_user: String,
    pub token_path: PathBuf,
    pub data_dir: PathBuf,
    pub log_path: PathBuf,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            data_url: CH_DATA_URL.to_string(),
            ftp_host: CH_FTP_HOST.to_string(),
            ftp_port: CH_FTP_PORT,
            ftp_user: CH_FTP_USER.to_string(),
            token_path: PathBuf::from(CH_TOKEN_PATH),
            data_dir: PathBuf::from(CH_DATA_DIR),
            log_path: PathBuf::from(CH_LOG_PATH),
        }
    }
}
