//! Typed MongoDB clients for docbridge
//!
//! A [`DbClient`] is built from a connection string and connects lazily, at
//! most once. Per-collection [`CollClient`]s derived from it carry a default
//! field projection and expose find, count, update, insert, bulk and
//! find-and-modify operations as async methods.
//!
//! ```ignore
//! use bson::doc;
//! use docbridge_mongodb::{DbClient, Fields};
//!
//! let db = DbClient::new("mongodb://localhost:27017/shop");
//! let users = db.get_coll_client::<User>("users", Fields::new().include("name"));
//! let alice = users.get_one(doc! { "name": "alice" }, None).await?;
//! ```

pub mod client;
pub mod collection;
pub mod connection;
pub mod projection;

pub use client::DbClient;
pub use collection::{BulkUpdate, CollClient, DocumentId, FindAndModifyOptions};
pub use connection::{db_name_from_url, ClientConfig};
pub use docbridge_common::{BridgeError, FailurePolicy, Result};
pub use projection::{DocumentShape, Fields};
