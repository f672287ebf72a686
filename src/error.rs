use crate::pushport_subscriber::PushPortError;
use anyhow;
use config_file::ConfigFileError;

use std::fmt;

#[derive(Debug)]
pub enum Error {
    ConfigFileError(ConfigFileError),
    AnyhowError(anyhow::Error),
    PushPortError(PushPortError),
    SerdeJsonError(serde_json::Error),
    PostgresError(tokio_postgres::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::ConfigFileError(e) => write!(f, "darwindb config error: {}", e),
            Error::AnyhowError(e) => write!(f, "darwindb transport error: {}", e),
            Error::PushPortError(e) => write!(f, "darwindb error: {}", e),
            Error::SerdeJsonError(e) => write!(f, "darwindb decode error: {}", e),
            Error::PostgresError(e) => write!(f, "darwindb database error: {}", e),
        }
    }
}

impl From<ConfigFileError> for Error {
    fn from(error: ConfigFileError) -> Self {
        Error::ConfigFileError(error)
    }
}

impl From<anyhow::Error> for Error {
    fn from(error: anyhow::Error) -> Self {
        Error::AnyhowError(error)
    }
}

impl From<PushPortError> for Error {
    fn from(error: PushPortError) -> Self {
        Error::PushPortError(error)
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::SerdeJsonError(error)
    }
}

impl From<tokio_postgres::Error> for Error {
    fn from(error: tokio_postgres::Error) -> Self {
        Error::PostgresError(error)
    }
}
