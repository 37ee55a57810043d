use thiserror::Error;

use crate::cluster::Role;
use crate::storage::PersistenceError;

/// Outcome of a node-level operation that did not succeed.
///
/// None of these are fatal to the serving process; the HTTP layer maps
/// every variant to a response.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Authorization denied")]
    AuthorizationDenied,
    #[error("No data has been synchronized from the master yet")]
    NoData,
    #[error("Persistence failure: {0}")]
    Persistence(#[from] PersistenceError),
    #[error("This node is not a {required}")]
    RoleMismatch { required: Role },
    #[error("Master unreachable and cached data is older than the staleness limit")]
    SyncUnavailable,
    #[error("Validation error: {0}")]
    Validation(String),
}
