//! Pool-level error types

use soquel_core::DbError;
use thiserror::Error;

/// Error surfaced by a checkout attempt
#[derive(Error, Debug)]
pub enum PoolError {
    /// The factory failed to produce a new connection, or the connection
    /// could not be made transactionally clean before hand-out.
    #[error("Checkout failed: {0}")]
    CheckoutFailed(#[source] DbError),

    /// Every candidate connection in one checkout attempt was bad. A strong
    /// hint that the database is down.
    #[error("Could not get a good connection to the database after {attempts} attempts")]
    Unreachable {
        /// Number of bad connections seen by this attempt
        attempts: usize,
    },

    /// The pool was shut down while the caller was waiting for a connection.
    #[error("Pool was shut down while waiting for a connection")]
    Interrupted,

    /// The checkout loop ended without producing a lease.
    #[error("Pool returned a null lease")]
    NullLease,
}
