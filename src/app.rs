//! Process bootstrap shared by the `bookshelf` binary and `bookshelf-cli serve`.

use anyhow::Context;
use bookshelf_db::Database;
use bookshelf_kernel::{settings::Settings, InitCtx, ModuleRegistry};

use crate::modules;

/// Connect, run every module, serve until a shutdown signal, then tear down.
///
/// Once the database is connected, modules are always stopped before this
/// returns, whether serving succeeded or not.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    tracing::info!(
        env = ?settings.environment,
        database = %settings.database.name,
        "bookshelf bootstrap starting"
    );

    let database = Database::connect(&settings.database)
        .await
        .context("failed to connect to the database")?;

    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, &database, &settings);

    let served = serve(&registry, &settings).await;
    let stopped = registry.stop_all().await;

    served?;
    stopped.context("failed to stop modules")?;

    tracing::info!("bookshelf shutdown complete");
    Ok(())
}

async fn serve(registry: &ModuleRegistry, settings: &Settings) -> anyhow::Result<()> {
    let ctx = InitCtx { settings };
    registry.init_all(&ctx).await?;
    registry.start_all(&ctx).await?;

    tracing::info!("bookshelf bootstrap complete");
    bookshelf_http::start_server(registry, settings).await
}
