//! Connection factory contract and connect parameters

use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use soquel_core::{Connection, Result};

/// The credential triple a pool is configured with
///
/// Every connection the pool hands out was produced from one of these. The
/// [`type_code`](ConnectParams::type_code) fingerprint stamped on each lease
/// lets the pool detect handles produced under credentials it no longer
/// uses, e.g. a lease returned after the url was changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectParams {
    url: String,
    username: String,
    password: String,
}

impl ConnectParams {
    /// Create connect parameters from a url and credentials
    pub fn new(
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    /// Get the connection url
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Get the username
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Get the password
    pub fn password(&self) -> &str {
        &self.password
    }

    pub(crate) fn set_url(&mut self, url: String) {
        self.url = url;
    }

    pub(crate) fn set_username(&mut self, username: String) {
        self.username = username;
    }

    pub(crate) fn set_password(&mut self, password: String) {
        self.password = password;
    }

    /// Fingerprint of the credential triple
    ///
    /// Only ever compared against other codes produced by the same pool, so
    /// the hash does not need to be stable across processes.
    pub fn type_code(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.url.hash(&mut hasher);
        self.username.hash(&mut hasher);
        self.password.hash(&mut hasher);
        hasher.finish()
    }
}

/// Factory trait for creating new raw connections
///
/// The pool calls `create` whenever it needs a fresh transport connection
/// and never retries at this layer; a failure surfaces to the checkout
/// caller as-is.
pub trait ConnectionFactory: Send + Sync + 'static {
    /// Create a new connection for the given parameters
    ///
    /// May block on the network. The pool owns the returned connection
    /// exclusively until it is hard-closed.
    fn create(&self, params: &ConnectParams) -> Result<Arc<dyn Connection>>;
}

impl<T: ConnectionFactory> ConnectionFactory for Arc<T> {
    fn create(&self, params: &ConnectParams) -> Result<Arc<dyn Connection>> {
        (**self).create(params)
    }
}
