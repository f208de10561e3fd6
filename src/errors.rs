//! # Error Types Module
//!
//! This module defines the error taxonomy used by the expense tracker.
//! Parse failures are user-correctable and get a guided reply; every other
//! failure is logged with its kind and answered with one generic message.

use thiserror::Error;

/// Failures while reading an amount or a reporting period from user text
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// No signed decimal number anywhere in the text
    #[error("no amount found in message")]
    NoAmountFound,
    /// Description longer than the configured maximum (in characters)
    #[error("description too long: {actual} characters (max {max})")]
    DescriptionTooLong { max: usize, actual: usize },
    /// Amount does not fit in the currency's minor unit range
    #[error("amount out of range: {0}")]
    AmountOutOfRange(String),
    /// Month or year token that cannot be interpreted
    #[error("invalid period token: {0}")]
    InvalidPeriod(String),
}

/// Failures while decoding or encoding inline keyboard callback data
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallbackError {
    /// Structurally invalid payload
    #[error("malformed callback data: {0}")]
    Malformed(String),
    /// Well-formed payload carrying a discriminator outside the known set
    #[error("unrecognised callback type: {0}")]
    UnrecognisedType(String),
    /// Encoded payload exceeds Telegram's callback data ceiling
    #[error("callback payload is {0} bytes, over the transport limit")]
    PayloadTooLarge(usize),
}

impl CallbackError {
    /// Short label used as a structured log field
    pub fn kind(&self) -> &'static str {
        match self {
            CallbackError::Malformed(_) => "malformed",
            CallbackError::UnrecognisedType(_) => "unrecognised_type",
            CallbackError::PayloadTooLarge(_) => "payload_too_large",
        }
    }
}

/// Persistence failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    /// Stored value that cannot be interpreted (bad currency code, state JSON, ...)
    #[error("corrupt stored value: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl Into<i64>) -> Self {
        StoreError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Caller contract violations when building keyboards
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyboardError {
    #[error("pagination limit must be greater than zero")]
    InvalidLimit,
    #[error("keyboard column count must be greater than zero")]
    InvalidColumns,
}

/// Top-level error for handling a single update
#[derive(Debug, Error)]
pub enum BotError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Callback(#[from] CallbackError),
    #[error(transparent)]
    Store(StoreError),
    #[error("{0} not found")]
    NotFound(String),
    #[error(transparent)]
    Keyboard(#[from] KeyboardError),
    #[error("user {0} is not registered")]
    UserNotRegistered(i64),
    #[error("export failed: {0}")]
    Export(String),
}

impl From<StoreError> for BotError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => BotError::NotFound(format!("{entity} {id}")),
            other => BotError::Store(other),
        }
    }
}

impl BotError {
    /// Short label used as a structured log field
    pub fn kind(&self) -> &'static str {
        match self {
            BotError::Parse(_) => "parse",
            BotError::Callback(e) => e.kind(),
            BotError::Store(_) => "store",
            BotError::NotFound(_) => "not_found",
            BotError::Keyboard(_) => "keyboard",
            BotError::UserNotRegistered(_) => "user_not_registered",
            BotError::Export(_) => "export",
        }
    }

    /// Whether the user gets a specific guidance message instead of the generic one
    pub fn is_user_correctable(&self) -> bool {
        matches!(self, BotError::Parse(_) | BotError::UserNotRegistered(_))
    }
}

/// Configuration loading failures
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}
