use anyhow::Context;
use clap::{Parser, Subcommand};
use shelf_kernel::settings::Settings;

#[derive(Parser)]
#[command(name = "shelf")]
#[command(about = "Books and reviews API")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override the listening port
    #[arg(short, long, global = true)]
    port: Option<u16>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the API server (default if no subcommand specified)
    Serve,

    /// Print the resolved settings as JSON. User tokens are never printed.
    Settings,

    /// Print the merged OpenAPI document
    Openapi,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load().with_context(|| "failed to load Shelf settings")?;
    if let Some(port) = cli.port {
        settings.server.port = port;
    }

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            shelf_telemetry::init(&settings.telemetry)?;
            tracing::info!(env = ?settings.environment, "shelf serve");
            shelf_app::run(settings).await
        }
        Commands::Settings => {
            println!("{}", serde_json::to_string_pretty(&settings)?);
            Ok(())
        }
        Commands::Openapi => {
            let state = shelf_app::AppState::in_memory(&settings).await?;
            let registry = shelf_app::build_registry(&state);
            let document = shelf_http::router::merged_openapi(&registry);
            println!("{}", serde_json::to_string_pretty(&document)?);
            Ok(())
        }
    }
}
