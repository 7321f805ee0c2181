//! Wire models for the identity services.

use serde::Deserialize;

/// Response of the salt lookup service.
#[derive(Debug, Clone, Deserialize)]
pub struct SaltData {
    /// The account's KDF salt, base64 encoded.
    pub salt: String,
}

/// Response of the user id lookup service.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdData {
    /// Id of the authenticated user.
    pub user_id: String,
}

/// The user's membership in its user group.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMembership {
    /// Id of the group.
    pub group: String,
    /// The group key, wrapped with the user's passphrase key (internal
    /// users) - base64 encoded.
    pub sym_enc_g_key: String,
}

/// The server-held user record.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// The user's group membership.
    pub user_group: GroupMembership,
    /// The client key, wrapped with the passphrase key; absent for external
    /// users - base64 encoded.
    #[serde(default)]
    pub pw_enc_client_key: Option<String>,
}
