//! Generic entity CRUD over the REST transport.
//!
//! Builds URLs from a resource path, an optional list partition id, an
//! optional element id and caller-supplied query parameters, issues the
//! request through the opaque [`RestClient`], and materializes the raw JSON
//! payloads into [`Entity`] envelopes. Every successful read runs the
//! session-key loading pipeline over the batch before returning.

use std::sync::Arc;

use futures::future::join_all;
use serde_json::Value;
use thiserror::Error;

use super::client::{Headers, RestClient};
use super::session_keys::{
    self, OwnerKeyResolver, SessionKeyLoadError, SessionKeyResolver,
};
use super::{RestError, constants};
use crate::entity::{Entity, EntityId, TypeRef};
use crate::session::Session;

/// Query parameters, serialized in the order given.
///
/// Values are appended to the URL verbatim; callers pre-encode anything that
/// needs escaping (the auth verifier is already URL-safe by construction).
pub type Params = Vec<(String, String)>;

/// Failure of an entity operation.
#[derive(Debug, Error)]
pub enum EntityRestError {
    /// The transport or response mapping failed.
    #[error(transparent)]
    Rest(#[from] RestError),
    /// The batch was fetched but session-key resolution failed partway.
    #[error(transparent)]
    SessionKey(#[from] SessionKeyLoadError),
    /// The entity has no server-assigned identifier yet.
    #[error("entity has no identifier")]
    MissingId,
}

/// Build the URL for a resource.
///
/// The path is lower-cased; `listId` and `id` are appended as path segments
/// when present; parameters become `?k1=v1&k2=v2` with no trailing `&` and
/// no percent-encoding.
pub fn create_url(path: &str, list_id: Option<&str>, id: Option<&str>, params: &Params) -> String {
    let mut url = path.to_lowercase();
    if let Some(list_id) = list_id {
        url.push('/');
        url.push_str(list_id);
    }
    if let Some(id) = id {
        url.push('/');
        url.push_str(id);
    }
    if !params.is_empty() {
        url.push('?');
        let query: Vec<String> = params.iter().map(|(k, v)| format!("{k}={v}")).collect();
        url.push_str(&query.join("&"));
    }
    url
}

/// Generic typed access to server entities.
pub struct EntityRestClient {
    rest: Arc<dyn RestClient>,
    resolver: Box<dyn SessionKeyResolver>,
}

impl EntityRestClient {
    /// Create an entity client with the default session-key resolver.
    pub fn new(rest: Arc<dyn RestClient>) -> Self {
        Self::with_resolver(rest, Box::new(OwnerKeyResolver))
    }

    /// Create an entity client with a custom session-key resolver.
    pub fn with_resolver(rest: Arc<dyn RestClient>, resolver: Box<dyn SessionKeyResolver>) -> Self {
        EntityRestClient { rest, resolver }
    }

    /// Load a single entity.
    pub async fn get_element(
        &self,
        type_ref: TypeRef,
        id: &str,
        list_id: Option<&str>,
        params: &Params,
        headers: &Headers,
        session: &Session,
    ) -> Result<Entity, EntityRestError> {
        let url = create_url(type_ref.path, list_id, Some(id), params);
        let body = self
            .rest
            .get(&url, headers)
            .await?
            .ok_or(RestError::EmptyResponse)?;
        let raw: Value = serde_json::from_str(&body).map_err(RestError::Json)?;

        let loaded = self.materialize(type_ref, vec![raw], session).await?;
        loaded
            .into_iter()
            .next()
            .ok_or(EntityRestError::Rest(RestError::EmptyResponse))
    }

    /// Load several entities of one type in a single request.
    ///
    /// The ids are joined into one comma-separated query parameter in input
    /// order, without deduplication; the response is materialized in
    /// response order. An empty `ids` slice skips the network round trip
    /// entirely and yields an empty batch.
    pub async fn get_elements(
        &self,
        type_ref: TypeRef,
        ids: &[&str],
        params: &Params,
        headers: &Headers,
        session: &Session,
    ) -> Result<Vec<Entity>, EntityRestError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut all_params = params.clone();
        all_params.push((constants::IDS_PARAM.to_owned(), ids.join(",")));
        let url = create_url(type_ref.path, None, None, &all_params);

        let body = self
            .rest
            .get(&url, headers)
            .await?
            .ok_or(RestError::EmptyResponse)?;
        let raw: Vec<Value> = serde_json::from_str(&body).map_err(RestError::Json)?;
        log::debug!("loaded {} {} elements", raw.len(), type_ref.path);

        Ok(self.materialize(type_ref, raw, session).await?)
    }

    /// Load a range of entities from a list partition.
    pub async fn get_element_range(
        &self,
        type_ref: TypeRef,
        list_id: &str,
        start: &str,
        count: usize,
        reverse: bool,
        params: &Params,
        headers: &Headers,
        session: &Session,
    ) -> Result<Vec<Entity>, EntityRestError> {
        let mut all_params = params.clone();
        all_params.push((constants::START_ID_PARAM.to_owned(), start.to_owned()));
        all_params.push((constants::COUNT_PARAM.to_owned(), count.to_string()));
        all_params.push((constants::REVERSE_PARAM.to_owned(), reverse.to_string()));
        let url = create_url(type_ref.path, Some(list_id), None, &all_params);

        let body = self
            .rest
            .get(&url, headers)
            .await?
            .ok_or(RestError::EmptyResponse)?;
        let raw: Vec<Value> = serde_json::from_str(&body).map_err(RestError::Json)?;

        Ok(self.materialize(type_ref, raw, session).await?)
    }

    /// Store a new entity.
    ///
    /// On success the server-assigned identifier and permissions id are
    /// written back into `entity`; no other field is touched.
    pub async fn post_element(
        &self,
        entity: &mut Entity,
        list_id: Option<&str>,
        params: &Params,
        headers: &Headers,
    ) -> Result<(), EntityRestError> {
        let url = create_url(entity.type_ref.path, list_id, None, params);
        let body = entity.to_json().to_string();

        let response = self
            .rest
            .post(&url, headers, &body)
            .await?
            .ok_or(RestError::EmptyResponse)?;
        let assigned: Value = serde_json::from_str(&response).map_err(RestError::Json)?;

        entity.id = assigned
            .get(crate::entity::ID_FIELD)
            .and_then(EntityId::from_value);
        entity.permissions = assigned
            .get(crate::entity::PERMISSIONS_FIELD)
            .and_then(Value::as_str)
            .map(str::to_owned);
        Ok(())
    }

    /// POST to a service endpoint that is not entity-shaped.
    ///
    /// # Returns
    /// The raw response body, if any.
    pub async fn post_service(
        &self,
        path: &str,
        body: &Value,
        params: &Params,
        headers: &Headers,
    ) -> Result<Option<String>, EntityRestError> {
        let url = create_url(path, None, None, params);
        Ok(self.rest.post(&url, headers, &body.to_string()).await?)
    }

    /// Update an existing entity.
    ///
    /// The list id and element id are taken from the entity's stored
    /// identifier.
    pub async fn put_element(
        &self,
        entity: &Entity,
        params: &Params,
        headers: &Headers,
    ) -> Result<(), EntityRestError> {
        let id = entity.id.as_ref().ok_or(EntityRestError::MissingId)?;
        let url = create_url(entity.type_ref.path, id.list_id(), Some(id.id()), params);
        self.rest
            .put(&url, headers, &entity.to_json().to_string())
            .await?;
        Ok(())
    }

    /// Create a new list partition.
    ///
    /// # Returns
    /// The id of the new partition.
    pub async fn post_list(
        &self,
        path: &str,
        params: &Params,
        headers: &Headers,
    ) -> Result<String, EntityRestError> {
        let url = create_url(path, None, None, params);
        let body = self
            .rest
            .post(&url, headers, "")
            .await?
            .ok_or(RestError::EmptyResponse)?;
        Ok(body)
    }

    /// Delete several entities, one request per id, all issued concurrently.
    ///
    /// Completion is reported only after every request has finished. Failed
    /// deletes are aggregated into [`RestError::PartialDelete`] so the
    /// caller knows exactly which ids are still on the server; success means
    /// every id was deleted.
    pub async fn delete_elements(
        &self,
        path: &str,
        ids: &[&str],
        list_id: Option<&str>,
        params: &Params,
        headers: &Headers,
    ) -> Result<(), EntityRestError> {
        let requests = ids.iter().map(|&id| {
            let url = create_url(path, list_id, Some(id), params);
            async move { (id.to_string(), self.rest.delete(&url, headers).await) }
        });

        let results = join_all(requests).await;
        let failed: Vec<(String, RestError)> = results
            .into_iter()
            .filter_map(|(id, result)| result.err().map(|err| (id, err)))
            .collect();

        if failed.is_empty() {
            Ok(())
        } else {
            log::warn!("{} of {} deletes on {path} failed", failed.len(), ids.len());
            Err(EntityRestError::Rest(RestError::PartialDelete {
                total: ids.len(),
                failed,
            }))
        }
    }

    async fn materialize(
        &self,
        type_ref: TypeRef,
        raw: Vec<Value>,
        session: &Session,
    ) -> Result<Vec<Entity>, SessionKeyLoadError> {
        let entities: Vec<Entity> = raw
            .into_iter()
            .map(|payload| Entity::from_json(type_ref, payload))
            .collect();
        session_keys::load_session_keys(entities, self.resolver.as_ref(), session).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_create_url_full() {
        let url = create_url(
            "Path",
            Some("L1"),
            Some("I1"),
            &params(&[("a", "1"), ("b", "2")]),
        );
        assert_eq!(url, "path/L1/I1?a=1&b=2");
    }

    #[test]
    fn test_create_url_bare_path() {
        assert_eq!(create_url("Path", None, None, &Params::new()), "path");
    }

    #[test]
    fn test_create_url_lowercases_path_only() {
        // Ids are case-sensitive server identifiers and must pass untouched.
        let url = create_url("MailBody", Some("AbC"), Some("DeF"), &Params::new());
        assert_eq!(url, "mailbody/AbC/DeF");
    }

    #[test]
    fn test_create_url_id_without_list() {
        assert_eq!(
            create_url("user", None, Some("u1"), &Params::new()),
            "user/u1"
        );
    }

    #[test]
    fn test_create_url_preserves_parameter_order() {
        let url = create_url("p", None, None, &params(&[("z", "1"), ("a", "2"), ("m", "3")]));
        assert_eq!(url, "p?z=1&a=2&m=3");
    }

    #[test]
    fn test_create_url_no_trailing_ampersand() {
        let url = create_url("p", None, None, &params(&[("a", "1")]));
        assert!(!url.ends_with('&'));
        assert_eq!(url, "p?a=1");
    }
}
