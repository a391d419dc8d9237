use anyhow::Context;
use bookshelf_kernel::settings::Settings;
use clap::{Parser, Subcommand};

/// Operate the bookshelf service
#[derive(Debug, Parser)]
#[command(name = "bookshelf-cli", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Connect to the database and serve the HTTP API
    Serve,
    /// Print the resolved settings as JSON (connection string masked)
    Config,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load().with_context(|| "failed to load bookshelf settings")?;

    match cli.command {
        Command::Serve => {
            bookshelf_telemetry::init(&settings.telemetry);
            let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
            runtime.block_on(bookshelf_app::app::run(settings))
        }
        Command::Config => {
            let shown = Settings {
                database: settings.database.redacted(),
                ..settings
            };
            let rendered =
                serde_json::to_string_pretty(&shown).context("failed to render settings")?;
            println!("{}", rendered);
            Ok(())
        }
    }
}
