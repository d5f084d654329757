//! CONTRACTS FINDER SCRAPER + COMPANIES HOUSE BULK FETCH
//!
//! Two independent pipelines share this crate:
//!  -   `process` drives a browser through the Contracts Finder search results, extracts
//!      each awarded notice with `parse::extract` and appends it to a CSV via `sink`.
//!  -   `fetch` mirrors the Companies House bulk data products into local directories.

mod error;
mod labels;
mod macros;

pub mod config;
pub mod fetch;
pub mod ftp;
pub mod logging;
pub mod navigate;
pub mod parse;
pub mod process;
pub mod record;
pub mod request;
pub mod sink;

pub use error::{Error, Result};

const SEARCH_URL: &str = "https://www.contractsfinder.service.gov.uk/Search";
const WEBDRIVER_URL: &str = "http://localhost:4444";
/// Safety cap on results pages when the listing doesn't say how many there are.
const MAX_PAGES: usize = 301;
const MAX_ATTEMPTS: usize = 5;
const COOLDOWN_SECS: u64 = 360;
const WAIT_TIMEOUT_SECS: u64 = 20;
const POLL_INTERVAL_MILLIS: u64 = 500;
const SEARCH_SETTLE_SECS: u64 = 5;
const RESULT_SETTLE_SECS: u64 = 3;

const CH_DATA_URL: &str = "http://download.companieshouse.gov.uk/";
const CH_FTP_HOST: &str = "ftp.bulk.companieshouse.gov.uk";
const CH_FTP_PORT: u16 = 21;
const CH_FTP_USER: &str = "oxford";
const CH_TOKEN_PATH: &str = "tokens/ftp_token";
const CH_DATA_DIR: &str = "data";
const CH_LOG_PATH: &str = "logging/get_ch_data.log";
