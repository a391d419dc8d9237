//! MongoDB connection manager.
//!
//! A [`Database`] is created once at startup, cloned into whatever needs a
//! collection handle, and released through [`Database::shutdown`] (normally via
//! [`DatabaseModule`] when the module registry stops).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bookshelf_kernel::settings::DatabaseSettings;
use bookshelf_kernel::{InitCtx, Module};
use mongodb::bson::doc;
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection};
use thiserror::Error;

/// Failures establishing or releasing the database connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("database uri is empty")]
    EmptyUri,

    #[error("database connection failed: {0}")]
    Driver(#[from] mongodb::error::Error),
}

/// Handle to the single database the service talks to.
///
/// Cloning is cheap; all clones share one driver connection pool.
#[derive(Clone, Debug)]
pub struct Database {
    client: Client,
    database: mongodb::Database,
    closed: Arc<AtomicBool>,
}

impl Database {
    /// Connect and verify the server answers a `ping`.
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self, ConnectionError> {
        let database = Self::open(settings).await?;
        database.verify().await?;

        tracing::info!(
            target: "bookshelf-db",
            database = %settings.name,
            "database connection established"
        );
        Ok(database)
    }

    /// Build the client without touching the network.
    async fn open(settings: &DatabaseSettings) -> Result<Self, ConnectionError> {
        if settings.uri.is_empty() {
            return Err(ConnectionError::EmptyUri);
        }

        let mut options = ClientOptions::parse(&settings.uri).await?;
        let timeout = Duration::from_millis(settings.connect_timeout_ms);
        options.connect_timeout = Some(timeout);
        options.server_selection_timeout = Some(timeout);

        let client = Client::with_options(options)?;
        let database = client.database(&settings.name);

        Ok(Self {
            client,
            database,
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Ping the server. On failure the client is shut down before the error
    /// is returned, so a rejected connection leaves no background monitors.
    async fn verify(&self) -> Result<(), ConnectionError> {
        if let Err(err) = self.database.run_command(doc! { "ping": 1 }).await {
            if let Err(shutdown_err) = self.shutdown().await {
                tracing::warn!(target: "bookshelf-db", error = %shutdown_err, "failed to release client after ping failure");
            }
            return Err(err.into());
        }
        Ok(())
    }

    /// Typed handle to a named collection. No I/O.
    pub fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.database.collection(name)
    }

    /// Name of the database every collection handle is scoped to.
    pub fn name(&self) -> &str {
        self.database.name()
    }

    /// Release the driver client. Later calls are no-ops.
    pub async fn shutdown(&self) -> Result<(), ConnectionError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            tracing::debug!(target: "bookshelf-db", "database already shut down");
            return Ok(());
        }

        self.client.clone().shutdown().await;
        tracing::info!(target: "bookshelf-db", "database connection closed");
        Ok(())
    }
}

/// Core module owning the connection's teardown.
pub struct DatabaseModule {
    database: Database,
}

impl DatabaseModule {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

#[async_trait]
impl Module for DatabaseModule {
    fn name(&self) -> &'static str {
        "db"
    }

    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            database = self.database.name(),
            "db module initialized"
        );
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        // Teardown is best effort.
        if let Err(err) = self.database.shutdown().await {
            tracing::warn!(module = self.name(), error = %err, "database shutdown failed");
        }
        Ok(())
    }
}
