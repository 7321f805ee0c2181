//! Session-key resolution for freshly fetched entities.
//!
//! After a batch of entities has been deserialized, each one's session key
//! is resolved strictly sequentially, in input order. Sequential processing
//! is deliberate: resolving an entity's key may depend on state decrypted
//! while resolving an earlier entity in the same batch, so entity N+1's
//! resolution must be able to assume entities 1..N are fully resolved.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::crypto::keys::{self, SymmetricKey};
use crate::crypto::{self, CryptoError};
use crate::entity::Entity;
use crate::session::Session;

/// Payload field carrying the session key wrapped with the owner group key.
pub const OWNER_ENC_SESSION_KEY_FIELD: &str = "_ownerEncSessionKey";

/// Per-entity session-key resolution failure.
#[derive(Debug, Error)]
pub enum KeyResolutionError {
    /// The session holds no group key to unwrap the entity's key with.
    #[error("no group key available in the session")]
    MissingGroupKey,
    /// An encrypted entity carries no wrapped session key.
    #[error("entity carries no encrypted session key")]
    MissingKeyBlob,
    /// Decoding or unwrapping the session key failed.
    #[error("session key decryption failed: {0}")]
    Crypto(#[from] CryptoError),
}

/// Resolves one entity's session key against the current session.
#[async_trait]
pub trait SessionKeyResolver: Send + Sync {
    /// Resolve the session key for `entity`, or `None` when the entity's
    /// type has no session-key slot.
    async fn resolve(
        &self,
        entity: &Entity,
        session: &Session,
    ) -> Result<Option<SymmetricKey>, KeyResolutionError>;
}

/// The common resolver: encrypted types carry their session key wrapped with
/// the owner group key in [`OWNER_ENC_SESSION_KEY_FIELD`].
pub struct OwnerKeyResolver;

#[async_trait]
impl SessionKeyResolver for OwnerKeyResolver {
    async fn resolve(
        &self,
        entity: &Entity,
        session: &Session,
    ) -> Result<Option<SymmetricKey>, KeyResolutionError> {
        if !entity.type_ref.encrypted {
            return Ok(None);
        }
        let blob_b64 = entity
            .field(OWNER_ENC_SESSION_KEY_FIELD)
            .and_then(Value::as_str)
            .ok_or(KeyResolutionError::MissingKeyBlob)?;
        let group_key = session
            .user_group_key
            .as_ref()
            .ok_or(KeyResolutionError::MissingGroupKey)?;
        let blob = crypto::decode_b64(blob_b64)?;
        Ok(Some(keys::decrypt_key(group_key, &blob)?))
    }
}

/// Failure of [`load_session_keys`].
///
/// Carries all input entities: those processed before the failure keep their
/// resolved keys, the failing entity and all subsequent ones are key-less.
#[derive(Debug, Error)]
#[error("session key resolution failed for entity {failed_index}: {source}")]
pub struct SessionKeyLoadError {
    /// The entities, partially resolved.
    pub entities: Vec<Entity>,
    /// Index of the entity whose resolution failed.
    pub failed_index: usize,
    /// The first resolution error.
    #[source]
    pub source: KeyResolutionError,
}

/// Resolve session keys for a batch of entities, in input order, stopping at
/// the first failure.
///
/// An empty batch succeeds with an empty result and makes no resolver calls.
pub async fn load_session_keys(
    mut entities: Vec<Entity>,
    resolver: &dyn SessionKeyResolver,
    session: &Session,
) -> Result<Vec<Entity>, SessionKeyLoadError> {
    for index in 0..entities.len() {
        match resolver.resolve(&entities[index], session).await {
            Ok(key) => entities[index].session_key = key,
            Err(source) => {
                return Err(SessionKeyLoadError {
                    entities,
                    failed_index: index,
                    source,
                });
            }
        }
    }
    Ok(entities)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::TypeRef;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const MAIL: TypeRef = TypeRef {
        path: "mail",
        encrypted: true,
    };
    const PLAIN: TypeRef = TypeRef {
        path: "plain",
        encrypted: false,
    };

    /// Resolver that counts calls and fails on entities flagged with "fail".
    struct CountingResolver {
        calls: AtomicUsize,
    }

    impl CountingResolver {
        fn new() -> Self {
            CountingResolver {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SessionKeyResolver for CountingResolver {
        async fn resolve(
            &self,
            entity: &Entity,
            _session: &Session,
        ) -> Result<Option<SymmetricKey>, KeyResolutionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if entity.field("fail").is_some() {
                Err(KeyResolutionError::MissingKeyBlob)
            } else {
                Ok(Some(SymmetricKey::generate()))
            }
        }
    }

    fn entity(payload: Value) -> Entity {
        Entity::from_json(MAIL, payload)
    }

    #[tokio::test]
    async fn test_empty_batch_makes_no_resolver_calls() {
        let resolver = CountingResolver::new();
        let session = Session::new();

        let loaded = load_session_keys(vec![], &resolver, &session).await.unwrap();
        assert!(loaded.is_empty());
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_all_resolved_in_order() {
        let resolver = CountingResolver::new();
        let session = Session::new();
        let batch = vec![entity(json!({"_id": "a"})), entity(json!({"_id": "b"}))];

        let loaded = load_session_keys(batch, &resolver, &session).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(loaded.iter().all(|e| e.session_key.is_some()));
        assert_eq!(loaded[0].id.as_ref().unwrap().id(), "a");
        assert_eq!(loaded[1].id.as_ref().unwrap().id(), "b");
    }

    #[tokio::test]
    async fn test_first_failure_short_circuits() {
        let resolver = CountingResolver::new();
        let session = Session::new();
        let batch = vec![
            entity(json!({"_id": "e1"})),
            entity(json!({"_id": "e2", "fail": true})),
            entity(json!({"_id": "e3"})),
        ];

        let err = load_session_keys(batch, &resolver, &session)
            .await
            .unwrap_err();

        assert_eq!(err.failed_index, 1);
        assert!(matches!(err.source, KeyResolutionError::MissingKeyBlob));
        assert_eq!(err.entities.len(), 3);
        assert!(err.entities[0].session_key.is_some());
        assert!(err.entities[1].session_key.is_none());
        assert!(err.entities[2].session_key.is_none());
        // e3 was never attempted
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_owner_resolver_unwraps_with_group_key() {
        let group_key = SymmetricKey::generate();
        let session_key = SymmetricKey::generate();
        let blob = keys::encrypt_key(&group_key, &session_key).unwrap();

        let mut session = Session::new();
        session.user_group_key = Some(group_key);

        let entity = Entity::from_json(
            MAIL,
            json!({"_id": "m1", "_ownerEncSessionKey": crypto::encode_b64(&blob)}),
        );

        let resolved = OwnerKeyResolver
            .resolve(&entity, &session)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved, session_key);
    }

    #[tokio::test]
    async fn test_owner_resolver_skips_unencrypted_types() {
        let session = Session::new();
        let entity = Entity::from_json(PLAIN, json!({"_id": "p1"}));
        let resolved = OwnerKeyResolver.resolve(&entity, &session).await.unwrap();
        assert!(resolved.is_none());
    }

    #[tokio::test]
    async fn test_owner_resolver_requires_group_key() {
        let session = Session::new();
        let entity = Entity::from_json(MAIL, json!({"_id": "m1", "_ownerEncSessionKey": "AAAA"}));
        let err = OwnerKeyResolver
            .resolve(&entity, &session)
            .await
            .unwrap_err();
        assert!(matches!(err, KeyResolutionError::MissingGroupKey));
    }

    #[tokio::test]
    async fn test_owner_resolver_requires_key_blob() {
        let mut session = Session::new();
        session.user_group_key = Some(SymmetricKey::generate());
        let entity = Entity::from_json(MAIL, json!({"_id": "m1"}));
        let err = OwnerKeyResolver
            .resolve(&entity, &session)
            .await
            .unwrap_err();
        assert!(matches!(err, KeyResolutionError::MissingKeyBlob));
    }
}
