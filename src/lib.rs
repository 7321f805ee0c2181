//! Client core for an end-to-end encrypted mail service.
//!
//! The crate covers two concerns:
//!
//! - **Login** ([`auth::UserController`]): turns a mail address and
//!   passphrase into a populated [`session::Session`] by deriving a key from
//!   the passphrase, proving it to the server via an authentication
//!   verifier, and decrypting the user's key chain.
//! - **Entity access** ([`rest::entity::EntityRestClient`]): generic CRUD
//!   over path-addressed, optionally list-partitioned server entities. Each
//!   fetched entity may carry its own encrypted session key, which is
//!   resolved against the session's key material before the entity is
//!   returned.
//!
//! The HTTP transport is an opaque collaborator behind
//! [`rest::client::RestClient`]; [`rest::client::HttpRestClient`] is the
//! reqwest-backed implementation.

pub mod auth;
pub mod crypto;
pub mod entity;
pub mod rest;
pub mod session;

pub use auth::{AuthError, UserController};
pub use entity::{Entity, EntityId, TypeRef};
pub use rest::RestError;
pub use session::Session;
