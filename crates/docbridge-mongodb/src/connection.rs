//! MongoDB connection configuration and establishment

use bson::doc;
use docbridge_common::{BridgeError, FailurePolicy, Result};
use mongodb::{
    options::{ClientOptions, ServerApi, ServerApiVersion},
    Client, Database,
};
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Client configuration used for whatever the connection string does not set
///
/// Options present in the connection string always win.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Minimum number of connections in the pool (default: driver default)
    pub min_pool_size: Option<u32>,
    /// Maximum number of connections in the pool (default: driver default)
    pub max_pool_size: Option<u32>,
    /// Maximum time a connection can remain idle before being closed (default: none)
    pub max_idle_time: Option<Duration>,
    /// Connection timeout (default: 10s)
    pub connect_timeout: Option<Duration>,
    /// Server selection timeout (default: 30s)
    pub server_selection_timeout: Option<Duration>,
    /// Application name for server logs
    pub app_name: Option<String>,
    /// Declare the stable API version V1 to the server
    pub stable_api: bool,
    /// Ping the server before handing out the database handle
    pub verify_connection: bool,
    /// What the lazy connection does after a failed attempt
    pub failure_policy: FailurePolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            min_pool_size: None,
            max_pool_size: None,
            max_idle_time: None,
            connect_timeout: Some(Duration::from_secs(10)),
            server_selection_timeout: Some(Duration::from_secs(30)),
            app_name: Some("docbridge".to_string()),
            stable_api: false,
            verify_connection: true,
            failure_policy: FailurePolicy::Retry,
        }
    }
}

impl ClientConfig {
    // Fills only what the connection string left unset
    fn apply(&self, client_options: &mut ClientOptions) {
        fill(&mut client_options.min_pool_size, self.min_pool_size);
        fill(&mut client_options.max_pool_size, self.max_pool_size);
        fill(&mut client_options.max_idle_time, self.max_idle_time);
        fill(&mut client_options.connect_timeout, self.connect_timeout);
        fill(&mut client_options.server_selection_timeout, self.server_selection_timeout);
        fill(&mut client_options.app_name, self.app_name.clone());
        if self.stable_api && client_options.server_api.is_none() {
            let server_api = ServerApi::builder().version(ServerApiVersion::V1).build();
            client_options.server_api = Some(server_api);
        }
    }
}

fn fill<V>(parsed: &mut Option<V>, fallback: Option<V>) {
    if parsed.is_none() {
        *parsed = fallback;
    }
}

/// Derive the database name from a connection string.
///
/// The path after the host list is taken up to any `?options` suffix and
/// exactly one leading `/` is stripped. A connection string without a path
/// yields an empty name.
///
/// ```
/// use docbridge_mongodb::db_name_from_url;
///
/// assert_eq!(db_name_from_url("mongodb://host/mydb"), "mydb");
/// assert_eq!(db_name_from_url("mongodb://host/"), "");
/// ```
pub fn db_name_from_url(connection_string: &str) -> String {
    let rest = connection_string
        .split_once("://")
        .map_or(connection_string, |(_, rest)| rest);
    let rest = rest.split_once('?').map_or(rest, |(before, _)| before);

    match rest.find('/') {
        Some(start) => {
            let path = &rest[start..];
            path.strip_prefix('/').unwrap_or(path).to_string()
        }
        None => String::new(),
    }
}

/// Open a client for `connection_string` and select the database named by
/// its path.
///
/// Fails with [`BridgeError::Connection`] when the path names no database;
/// every driver failure is returned unchanged.
#[instrument(skip_all, fields(verify = config.verify_connection))]
pub async fn connect(connection_string: &str, config: &ClientConfig) -> Result<Database> {
    let database_name = db_name_from_url(connection_string);
    if database_name.is_empty() {
        return Err(BridgeError::Connection(
            "No database name in connection string path".to_string(),
        ));
    }

    let mut client_options = ClientOptions::parse(connection_string).await?;
    config.apply(&mut client_options);

    let client = Client::with_options(client_options)?;
    let database = client.database(&database_name);

    if config.verify_connection {
        ping(&database).await?;
    }

    info!(database = %database_name, "MongoDB connection established");
    Ok(database)
}

/// Check the server is reachable by running `ping` against `database`
pub async fn ping(database: &Database) -> Result<()> {
    database.run_command(doc! { "ping": 1 }).await?;
    debug!(database = database.name(), "Ping succeeded");
    Ok(())
}
