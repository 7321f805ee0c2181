//! In-memory login session state.

use crate::auth::models::UserRecord;
use crate::crypto::keys::SymmetricKey;

/// The authenticated identity and its derived keys.
///
/// A session is owned by the [`crate::auth::UserController`] and mutated only
/// by it; everything else receives a `&Session`. After a successful login
/// exactly one of `user_passphrase_key` (internal user) or `auth_token`
/// (external user) is set, never both; after [`Session::reset`] both are
/// unset.
#[derive(Debug, Clone, Default)]
pub struct Session {
    /// Id of the logged-in user.
    pub user_id: Option<String>,
    /// Id of the user's group.
    pub user_group_id: Option<String>,
    /// Mail address the login was attempted with (internal users).
    pub mail_address: Option<String>,
    /// URL-safe base64 hash of the derived key, sent on authenticated
    /// requests.
    pub auth_verifier: Option<String>,
    /// The user's group key.
    pub user_group_key: Option<SymmetricKey>,
    /// Key derived from the passphrase (internal users only).
    pub user_passphrase_key: Option<SymmetricKey>,
    /// The user's client key (internal users only).
    pub user_client_key: Option<SymmetricKey>,
    /// Bearer-like token (external users only).
    pub auth_token: Option<String>,
    /// The fetched user record.
    pub logged_in_user: Option<UserRecord>,
}

impl Session {
    /// Create an empty, logged-out session.
    pub fn new() -> Self {
        Session::default()
    }

    /// Clear all state, so nobody is logged in.
    pub fn reset(&mut self) {
        *self = Session::default();
    }

    /// Whether an internal user is logged in.
    pub fn is_internal_user_logged_in(&self) -> bool {
        self.user_passphrase_key.is_some()
    }

    /// Whether an external user is logged in.
    pub fn is_external_user_logged_in(&self) -> bool {
        self.auth_token.is_some()
    }
}
