//! REST transport and generic entity access.

use thiserror::Error;

pub mod client;
pub mod entity;
pub mod session_keys;

/// Service paths and wire parameter names.
pub mod constants {
    /// Salt lookup service path.
    pub const SALT_SERVICE_PATH: &str = "saltservice";
    /// User id lookup service path.
    pub const USER_ID_SERVICE_PATH: &str = "useridservice";
    /// User record resource path.
    pub const USER_PATH: &str = "user";

    /// Mail address query parameter.
    pub const MAIL_ADDRESS_PARAM: &str = "mailAddress";
    /// Authentication verifier header/parameter.
    pub const AUTH_VERIFIER_PARAM: &str = "authVerifier";
    /// External-user authentication token header.
    pub const AUTH_TOKEN_PARAM: &str = "authToken";
    /// Comma-joined element ids for batched reads.
    pub const IDS_PARAM: &str = "ids";
    /// Range read start id.
    pub const START_ID_PARAM: &str = "startId";
    /// Range read element count.
    pub const COUNT_PARAM: &str = "count";
    /// Range read direction.
    pub const REVERSE_PARAM: &str = "reverse";
}

/// Errors surfaced by the transport and entity layers.
///
/// Nothing here is recovered locally; every failure is passed to the caller
/// unchanged in kind.
#[derive(Debug, Error)]
pub enum RestError {
    /// The request never completed (connection, DNS, protocol failure).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    /// The server answered with an unexpected status code.
    #[error("server returned status {code}")]
    Status {
        /// The HTTP status code.
        code: u16,
    },
    /// The addressed resource does not exist (404).
    #[error("not found")]
    NotFound,
    /// The server rejected the request's credentials (401/403).
    #[error("authentication rejected")]
    Authentication,
    /// The response body could not be parsed.
    #[error("malformed response body: {0}")]
    Json(#[from] serde_json::Error),
    /// A response body was expected but missing.
    #[error("response body missing")]
    EmptyResponse,
    /// One or more requests of a batched delete failed.
    #[error("{} of {total} deletes failed", failed.len())]
    PartialDelete {
        /// Number of ids in the batch.
        total: usize,
        /// Each failed id with the error its delete produced.
        failed: Vec<(String, RestError)>,
    },
}
