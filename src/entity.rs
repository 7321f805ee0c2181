//! Opaque entity envelope.
//!
//! The entity layer treats server records as an identifier plus a raw JSON
//! payload plus an optional per-entity session key. The concrete field
//! layouts of the server's types are not modeled here; callers deserialize
//! the payload into their own structs once the envelope is materialized.

use serde_json::Value;

use crate::crypto::keys::SymmetricKey;

/// Payload field carrying the server-assigned identifier.
pub const ID_FIELD: &str = "_id";

/// Payload field carrying the server-assigned permissions id.
pub const PERMISSIONS_FIELD: &str = "_permissions";

/// Identifier of a server entity.
///
/// Some resources are scoped under a list partition and need both a list id
/// and an element id to address one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityId {
    /// A bare element identifier.
    Element(String),
    /// An identifier scoped under a list partition.
    ListElement {
        /// The list partition id.
        list_id: String,
        /// The element id within the partition.
        id: String,
    },
}

impl EntityId {
    /// The element id.
    pub fn id(&self) -> &str {
        match self {
            EntityId::Element(id) => id,
            EntityId::ListElement { id, .. } => id,
        }
    }

    /// The list partition id, if the identifier is list scoped.
    pub fn list_id(&self) -> Option<&str> {
        match self {
            EntityId::Element(_) => None,
            EntityId::ListElement { list_id, .. } => Some(list_id),
        }
    }

    /// Parse an identifier from its wire form: either a plain string or a
    /// two-element `[listId, id]` array.
    pub fn from_value(value: &Value) -> Option<EntityId> {
        match value {
            Value::String(id) => Some(EntityId::Element(id.clone())),
            Value::Array(parts) => match parts.as_slice() {
                [Value::String(list_id), Value::String(id)] => Some(EntityId::ListElement {
                    list_id: list_id.clone(),
                    id: id.clone(),
                }),
                _ => None,
            },
            _ => None,
        }
    }

    /// The wire form of the identifier.
    pub fn to_value(&self) -> Value {
        match self {
            EntityId::Element(id) => Value::String(id.clone()),
            EntityId::ListElement { list_id, id } => {
                Value::Array(vec![Value::String(list_id.clone()), Value::String(id.clone())])
            }
        }
    }
}

/// Per-type metadata the entity layer needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeRef {
    /// URL path of the resource (lower-cased during URL construction).
    pub path: &'static str,
    /// Whether instances carry an encrypted session key.
    pub encrypted: bool,
}

/// A materialized server entity.
///
/// Created by the entity layer on every successful fetch; the session key
/// slot is empty until the session-key loading pipeline succeeds for it.
#[derive(Debug, Clone)]
pub struct Entity {
    /// The entity's type.
    pub type_ref: TypeRef,
    /// Server-assigned identifier; `None` for a locally built entity that
    /// has not been posted yet.
    pub id: Option<EntityId>,
    /// Server-assigned permissions id.
    pub permissions: Option<String>,
    /// The raw field payload as received from or sent to the server.
    pub payload: Value,
    /// The entity's decrypted session key, if it has one.
    pub session_key: Option<SymmetricKey>,
}

impl Entity {
    /// Build a new local entity that has not been stored on the server yet.
    pub fn new(type_ref: TypeRef, payload: Value) -> Self {
        Entity {
            type_ref,
            id: None,
            permissions: None,
            payload,
            session_key: None,
        }
    }

    /// Materialize an entity from a raw server payload, pulling the
    /// identifier and permissions out of the well-known fields.
    pub fn from_json(type_ref: TypeRef, payload: Value) -> Self {
        let id = payload.get(ID_FIELD).and_then(EntityId::from_value);
        let permissions = payload
            .get(PERMISSIONS_FIELD)
            .and_then(Value::as_str)
            .map(str::to_owned);
        Entity {
            type_ref,
            id,
            permissions,
            payload,
            session_key: None,
        }
    }

    /// Serialize the entity for the wire, writing the identifier and
    /// permissions back into the payload.
    pub fn to_json(&self) -> Value {
        let mut body = self.payload.clone();
        if let Value::Object(map) = &mut body {
            if let Some(id) = &self.id {
                map.insert(ID_FIELD.to_owned(), id.to_value());
            }
            if let Some(permissions) = &self.permissions {
                map.insert(
                    PERMISSIONS_FIELD.to_owned(),
                    Value::String(permissions.clone()),
                );
            }
        }
        body
    }

    /// Look up a raw payload field.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.payload.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const MAIL: TypeRef = TypeRef {
        path: "Mail",
        encrypted: true,
    };

    #[test]
    fn test_from_json_element_id() {
        let entity = Entity::from_json(MAIL, json!({"_id": "m1", "subject": "hi"}));
        assert_eq!(entity.id, Some(EntityId::Element("m1".into())));
        assert_eq!(entity.permissions, None);
        assert_eq!(entity.field("subject"), Some(&json!("hi")));
    }

    #[test]
    fn test_from_json_list_element_id() {
        let entity = Entity::from_json(MAIL, json!({"_id": ["l1", "m1"], "_permissions": "p1"}));
        assert_eq!(
            entity.id,
            Some(EntityId::ListElement {
                list_id: "l1".into(),
                id: "m1".into()
            })
        );
        assert_eq!(entity.permissions.as_deref(), Some("p1"));
    }

    #[test]
    fn test_from_json_without_id() {
        let entity = Entity::from_json(MAIL, json!({"subject": "hi"}));
        assert_eq!(entity.id, None);
        assert!(entity.session_key.is_none());
    }

    #[test]
    fn test_to_json_writes_back_identifier() {
        let mut entity = Entity::new(MAIL, json!({"subject": "hi"}));
        entity.id = Some(EntityId::ListElement {
            list_id: "l1".into(),
            id: "m1".into(),
        });
        entity.permissions = Some("p1".into());

        let body = entity.to_json();
        assert_eq!(body["_id"], json!(["l1", "m1"]));
        assert_eq!(body["_permissions"], json!("p1"));
        assert_eq!(body["subject"], json!("hi"));
    }

    #[test]
    fn test_malformed_id_is_ignored() {
        let entity = Entity::from_json(MAIL, json!({"_id": 42}));
        assert_eq!(entity.id, None);
    }
}
