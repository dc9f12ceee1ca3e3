//! Database client
//!
//! A [`DbClient`] owns one lazily-established connection and hands out
//! [`CollClient`]s that all share it. Nothing touches the network until the
//! first operation on a derived client.

use docbridge_common::{Hub, Result};
use mongodb::Database;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::collection::CollClient;
use crate::connection::{self, db_name_from_url, ClientConfig};
use crate::projection::Fields;

/// Root client bound to one connection string
///
/// Cloning is cheap and clones share the same connection.
#[derive(Debug, Clone)]
pub struct DbClient {
    database_name: String,
    config: ClientConfig,
    database: Arc<Hub<Database>>,
}

impl DbClient {
    /// Create a client with the default [`ClientConfig`]
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self::with_config(connection_string, ClientConfig::default())
    }

    /// Create a client with a custom configuration
    pub fn with_config(connection_string: impl Into<String>, config: ClientConfig) -> Self {
        let connection_string = connection_string.into();
        let database_name = db_name_from_url(&connection_string);

        let factory_config = config.clone();
        let database = Hub::with_policy(
            move || {
                let connection_string = connection_string.clone();
                let config = factory_config.clone();
                async move { connection::connect(&connection_string, &config).await }
            },
            config.failure_policy,
        );

        Self {
            database_name,
            config,
            database: Arc::new(database),
        }
    }

    /// Name of the database selected by the connection string path
    pub fn database_name(&self) -> &str {
        &self.database_name
    }

    /// Configuration the shared connection is built with
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Resolve the shared database handle, connecting on first use
    pub async fn database(&self) -> Result<Database> {
        self.database.get().await
    }

    /// Ping the server through the shared connection
    pub async fn ping(&self) -> Result<()> {
        let database = self.database().await?;
        connection::ping(&database).await
    }

    /// Build a client for collection `name` with `fields` as its default projection
    pub fn get_coll_client<T>(&self, name: impl Into<String>, fields: Fields) -> CollClient<T>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
    {
        let name = name.into();
        debug!(database = %self.database_name, collection = %name, "Creating collection client");
        CollClient::new(self.database.clone(), name, fields, self.config.failure_policy)
    }
}
