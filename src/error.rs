use thiserror::Error;

#[derive(Debug, Error)]
pub enum CounterError {
    #[error("invalid page url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid selector {selector:?}: {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error(transparent)]
    Pattern(#[from] regex::Error),

    #[error("no element matches {0:?}")]
    MissingElement(String),
}

pub type Result<T> = std::result::Result<T, CounterError>;
