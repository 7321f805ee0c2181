//! Login orchestration: from a presented credential to a populated session.
//!
//! The controller owns the [`Session`] and is the only component that
//! mutates it. Every login attempt is a total reset-then-attempt; there is
//! no partial login state visible to callers.

pub mod models;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::crypto::keys::{self, SymmetricKey};
use crate::crypto::{self, CryptoError, kdf};
use crate::rest::client::{Headers, RestClient};
use crate::rest::entity::{Params, create_url};
use crate::rest::{RestError, constants};
use crate::session::Session;
use models::{SaltData, UserIdData, UserRecord};

/// Authentication failure.
#[derive(Debug, Error)]
pub enum AuthError {
    /// A lookup or verifier check failed; surfaced unchanged in kind. A
    /// [`RestError::NotFound`] from the salt lookup means the account is
    /// unknown; a [`RestError::Authentication`] from the user id lookup
    /// means the password was wrong.
    #[error(transparent)]
    Rest(#[from] RestError),
    /// The key chain could not be decrypted after the server accepted the
    /// verifier. Fatal and non-retryable: the stored keys are corrupted,
    /// this is not a wrong password.
    #[error("key chain decryption failed: {source}")]
    CorruptedKeyChain {
        /// The underlying decryption failure.
        #[source]
        source: CryptoError,
    },
    /// Key derivation or encoding failed locally.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    /// A service response was missing a required field.
    #[error("malformed service response: missing {0}")]
    MalformedResponse(&'static str),
}

/// Authenticates users and owns the resulting [`Session`].
pub struct UserController {
    rest: Arc<dyn RestClient>,
    session: Session,
}

impl UserController {
    /// Create a controller with an empty session.
    pub fn new(rest: Arc<dyn RestClient>) -> Self {
        UserController {
            rest,
            session: Session::new(),
        }
    }

    /// Read access to the session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Whether an internal user is logged in.
    pub fn is_internal_user_logged_in(&self) -> bool {
        self.session.is_internal_user_logged_in()
    }

    /// Whether an external user is logged in.
    pub fn is_external_user_logged_in(&self) -> bool {
        self.session.is_external_user_logged_in()
    }

    /// Log the current user out, clearing all session state.
    pub fn logout(&mut self) {
        self.session.reset();
    }

    /// Log in an internal user with mail address and passphrase.
    ///
    /// On failure the session holds no key material; `mail_address` (and
    /// `user_id`, if the attempt got that far) may remain set for
    /// diagnostics. That residue is intentional but not a stable contract.
    pub async fn login(&mut self, mail_address: &str, passphrase: &str) -> Result<(), AuthError> {
        let result = self.login_internal(mail_address, passphrase).await;
        if result.is_err() {
            self.scrub_failed_attempt();
        }
        result
    }

    async fn login_internal(
        &mut self,
        mail_address: &str,
        passphrase: &str,
    ) -> Result<(), AuthError> {
        self.session.reset();
        self.session.mail_address = Some(mail_address.to_owned());

        let params: Params = vec![(
            constants::MAIL_ADDRESS_PARAM.to_owned(),
            mail_address.to_owned(),
        )];
        let salt_url = create_url(constants::SALT_SERVICE_PATH, None, None, &params);
        let salt_data: SaltData = match self.fetch_json(&salt_url, &Headers::new()).await {
            Ok(data) => data,
            Err(err) => {
                // Run the KDF anyway so an unknown address costs the same
                // wall-clock time as a wrong password, then report the
                // original lookup failure.
                let _ = kdf::derive_passphrase_key(passphrase, &kdf::PLACEHOLDER_SALT);
                return Err(err);
            }
        };

        let salt = crypto::decode_b64(&salt_data.salt)?;
        let derived_key_hex = kdf::derive_passphrase_key(passphrase, &salt)?;

        let verifier = crypto::auth_verifier(&derived_key_hex)?;
        self.session.auth_verifier = Some(verifier.clone());
        log::debug!("auth verifier computed");

        let mut auth_headers = Headers::new();
        auth_headers.insert(constants::AUTH_VERIFIER_PARAM.to_owned(), verifier);
        let user_id_url = create_url(constants::USER_ID_SERVICE_PATH, None, None, &params);
        // A failure here (wrong password) is surfaced as-is.
        let user_id_data: UserIdData = self.fetch_json(&user_id_url, &auth_headers).await?;

        self.session.user_id = Some(user_id_data.user_id.clone());
        let passphrase_key = SymmetricKey::from_hex(&derived_key_hex)?;

        let user = self.fetch_user(&user_id_data.user_id).await?;
        log::debug!("user record loaded");

        // Decrypt the key chain. Failure past this point is corrupted
        // credentials, not a wrong password.
        self.session.user_group_id = Some(user.user_group.group.clone());
        self.session.user_group_key = Some(Self::decrypt_chain_key(
            &passphrase_key,
            &user.user_group.sym_enc_g_key,
        )?);
        let client_key_blob = user
            .pw_enc_client_key
            .as_deref()
            .ok_or(AuthError::MalformedResponse("pwEncClientKey"))?;
        self.session.user_client_key =
            Some(Self::decrypt_chain_key(&passphrase_key, client_key_blob)?);

        self.session.user_passphrase_key = Some(passphrase_key);
        self.session.logged_in_user = Some(user);
        Ok(())
    }

    /// Log in an external user.
    ///
    /// The salt is supplied directly, so there is no account lookup round
    /// trip; the group key *is* the derived key, and `auth_token` is stored
    /// verbatim.
    pub async fn login_external(
        &mut self,
        user_id: &str,
        password: &str,
        salt_hex: &str,
        auth_token: &str,
    ) -> Result<(), AuthError> {
        let result = self
            .login_external_internal(user_id, password, salt_hex, auth_token)
            .await;
        if result.is_err() {
            self.scrub_failed_attempt();
        }
        result
    }

    async fn login_external_internal(
        &mut self,
        user_id: &str,
        password: &str,
        salt_hex: &str,
        auth_token: &str,
    ) -> Result<(), AuthError> {
        self.session.reset();
        self.session.user_id = Some(user_id.to_owned());

        let salt = crypto::decode_hex(salt_hex)?;
        let derived_key_hex = kdf::derive_passphrase_key(password, &salt)?;

        self.session.auth_verifier = Some(crypto::auth_verifier(&derived_key_hex)?);
        let group_key = SymmetricKey::from_hex(&derived_key_hex)?;

        let user = self.fetch_user_with_token(user_id, auth_token).await?;
        self.session.user_group_id = Some(user.user_group.group.clone());
        self.session.user_group_key = Some(group_key);
        self.session.logged_in_user = Some(user);
        self.session.auth_token = Some(auth_token.to_owned());
        Ok(())
    }

    async fn fetch_user(&self, user_id: &str) -> Result<UserRecord, AuthError> {
        let url = create_url(constants::USER_PATH, None, Some(user_id), &Params::new());
        self.fetch_json(&url, &self.auth_headers()).await
    }

    async fn fetch_user_with_token(
        &self,
        user_id: &str,
        auth_token: &str,
    ) -> Result<UserRecord, AuthError> {
        let url = create_url(constants::USER_PATH, None, Some(user_id), &Params::new());
        let mut headers = self.auth_headers();
        headers.insert(constants::AUTH_TOKEN_PARAM.to_owned(), auth_token.to_owned());
        self.fetch_json(&url, &headers).await
    }

    /// Headers authenticating requests on behalf of the session.
    pub fn auth_headers(&self) -> Headers {
        let mut headers = Headers::new();
        if let Some(verifier) = &self.session.auth_verifier {
            headers.insert(constants::AUTH_VERIFIER_PARAM.to_owned(), verifier.clone());
        }
        if let Some(token) = &self.session.auth_token {
            headers.insert(constants::AUTH_TOKEN_PARAM.to_owned(), token.clone());
        }
        headers
    }

    async fn fetch_json<T: DeserializeOwned>(
        &self,
        url: &str,
        headers: &Headers,
    ) -> Result<T, AuthError> {
        let body = self
            .rest
            .get(url, headers)
            .await?
            .ok_or(RestError::EmptyResponse)?;
        Ok(serde_json::from_str(&body).map_err(RestError::Json)?)
    }

    fn decrypt_chain_key(wrapping: &SymmetricKey, blob_b64: &str) -> Result<SymmetricKey, AuthError> {
        let blob = crypto::decode_b64(blob_b64)
            .map_err(|source| AuthError::CorruptedKeyChain { source })?;
        keys::decrypt_key(wrapping, &blob).map_err(|source| AuthError::CorruptedKeyChain { source })
    }

    // A failed attempt must not leave key material or a token behind; the
    // address and user id stay for diagnostics.
    fn scrub_failed_attempt(&mut self) {
        let mail_address = self.session.mail_address.take();
        let user_id = self.session.user_id.take();
        self.session.reset();
        self.session.mail_address = mail_address;
        self.session.user_id = user_id;
    }
}
