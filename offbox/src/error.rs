use offbox_backend::StoreError;
use offbox_core::FetchError;
use smol_str::SmolStr;
use thiserror::Error;

use crate::config::ConfigError;

/// Failure of one essential asset during install.
#[derive(Debug, Error)]
pub enum AssetFailure {
    /// The asset could not be fetched.
    #[error("{path}: {source}")]
    Fetch {
        /// Asset path.
        path: String,
        /// Underlying network error.
        source: FetchError,
    },
    /// The asset was fetched but the response was not 2xx.
    #[error("{path}: unexpected status {status}")]
    Status {
        /// Asset path.
        path: String,
        /// Received status.
        status: http::StatusCode,
    },
}

/// Install of a version failed. Nothing was written or deleted.
#[derive(Debug, Error)]
pub enum InstallError {
    /// Some essential assets could not be retrieved.
    #[error("install of {version} failed: {} essential asset(s) unavailable", failures.len())]
    AssetsUnavailable {
        /// Version being installed.
        version: SmolStr,
        /// Per-asset failures.
        failures: Vec<AssetFailure>,
    },
    /// Opening or writing the static generation failed.
    #[error("install of {version} failed: {source}")]
    Store {
        /// Version being installed.
        version: SmolStr,
        /// Underlying store error.
        source: StoreError,
    },
    /// The configuration is unusable.
    #[error("install of {version} failed: {source}")]
    Config {
        /// Version being installed.
        version: SmolStr,
        /// Underlying configuration error.
        source: ConfigError,
    },
}

/// Errors surfaced by the orchestrator.
///
/// Only [`Error::Install`] is fatal to an operation. Store errors on the
/// request path are treated as misses or dropped writes and never reach
/// the caller; network errors only surface when no fallback exists.
#[derive(Debug, Error)]
pub enum Error {
    /// Installing a version failed.
    #[error(transparent)]
    Install(#[from] InstallError),
    /// A store operation outside the request path failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    /// The network failed and no fallback was available.
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
