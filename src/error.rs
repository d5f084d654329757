use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("The selector you are trying to scrape for is missing. Selector: {0}")]
    ParseMissingSelector(String),

    #[error("UI element never became ready: {0}")]
    UiElementNotFound(String),
    #[error("No further results page.")]
    PaginationExhausted,

    #[error("Couldn't parse field `{field}` from {value:?}")]
    FieldParse { field: &'static str, value: String },

    #[error("Transfer of {resource} failed: {reason}")]
    TransferFailure { resource: String, reason: String },
    #[error("Login rejected: {0}")]
    Auth(String),

    #[error("Io Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tokio Join Error, couldn't await a task! {0}")]
    RuntimeJoin(#[from] tokio::task::JoinError),

    #[error("Reqwest Error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("Url Error: {0}")]
    Url(#[from] url::ParseError),
    #[error("WebDriver Error: {0}")]
    WebDriver(#[from] thirtyfour::error::WebDriverError),
    #[error("FTP Error: {0}")]
    Ftp(#[from] suppaftp::FtpError),
    #[error("CSV Error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Logger already installed: {0}")]
    Logger(#[from] log::SetLoggerError),
}

impl Error {
    /// Ends the scrape normally rather than counting as a failure.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Error::PaginationExhausted)
    }
}
