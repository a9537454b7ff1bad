use thiserror::Error;

#[derive(Error, Debug)]
pub enum MarketError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unsupported product type: '{value}'")]
    InvalidProductType { value: String },

    #[error("Unsupported {what}: '{value}'")]
    UnsupportedValue { what: &'static str, value: String },

    #[error("Invalid {field}: {value} (must be a positive, finite amount)")]
    InvalidAmount { field: &'static str, value: f64 },

    #[error("Institution roster is empty; nothing to synthesize offers from")]
    EmptyInstitutionRoster,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type MarketResult<T> = Result<T, MarketError>;
