use thiserror::Error;

pub type Result<T> = std::result::Result<T, AllocationError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AllocationError {
    /// Mathematically invalid input: non-positive wealth, gamma or volatility.
    #[error("domain error: {0}")]
    Domain(String),
    /// Unknown model tag or settings that violate their own invariants.
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("data source error: {0}")]
    DataSource(String),
}

impl AllocationError {
    pub fn domain(message: impl Into<String>) -> Self {
        Self::Domain(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn data_source(message: impl Into<String>) -> Self {
        Self::DataSource(message.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Domain(_) => "domain",
            Self::Configuration(_) => "configuration",
            Self::DataSource(_) => "data_source",
        }
    }
}
