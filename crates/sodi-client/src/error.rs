//! # Client Error Types
//!
//! Errors crossing the mutation controller boundary. Domain validation
//! failures (e.g. an over-payment) are NOT errors here: they are typed
//! outcome values. Only transport faults and corrupted records surface as
//! `ClientError`.

use thiserror::Error;

use sodi_core::CoreError;
use sodi_store::StoreError;

/// Errors produced by the mutation controller and payment orchestration.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The remote store refused or failed the operation. The optimistic
    /// cache write has already been rolled back when this surfaces.
    #[error("Store operation failed: {0}")]
    Store(#[from] StoreError),

    /// A fetched record could not be decoded into its domain type.
    #[error("Domain error: {0}")]
    Core(#[from] CoreError),
}

/// Result alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;
