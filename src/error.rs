use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// The entity a `NotFound` error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Cart,
    Product,
    Order,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resource::Cart => "shopping cart",
            Resource::Product => "product",
            Resource::Order => "order",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("{0} not found")]
    NotFound(Resource),
    #[error("shopping cart is empty")]
    EmptyCart,
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Backend error: {0}")]
    BackendError(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Outcome classification handed to whatever sits in front of the core
/// (an HTTP layer maps these to status codes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    EmptyCart,
    Validation,
    BackendFailure,
}

impl IntakeError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::BackendError(Box::new(std::io::Error::other(message.into())))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            IntakeError::NotFound(_) => ErrorKind::NotFound,
            IntakeError::EmptyCart => ErrorKind::EmptyCart,
            IntakeError::ValidationError(_) => ErrorKind::Validation,
            IntakeError::BackendError(_) => ErrorKind::BackendFailure,
        }
    }
}

impl From<sqlx::Error> for IntakeError {
    fn from(err: sqlx::Error) -> Self {
        IntakeError::BackendError(Box::new(err))
    }
}

impl From<sqlx::migrate::MigrateError> for IntakeError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        IntakeError::BackendError(Box::new(err))
    }
}

impl From<std::io::Error> for IntakeError {
    fn from(err: std::io::Error) -> Self {
        IntakeError::BackendError(Box::new(err))
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for IntakeError {
    fn from(err: rocksdb::Error) -> Self {
        IntakeError::BackendError(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, IntakeError>;
