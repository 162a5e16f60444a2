use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use labstock_auth::{hash_password, Authenticator};
use labstock_infra::{LabServices, Settings};
use labstock_observability::LogFormat;

#[derive(Parser, Debug)]
#[command(name = "labstock-api")]
#[command(about = "Lab inventory, borrow requests and tanker movements over HTTP")]
struct Cli {
    /// Settings file (TOML). Defaults to `labstock.toml` when present.
    #[arg(long, env = "LABSTOCK_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read a password from stdin and print its hash for the `users` table.
    HashPassword,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(Command::HashPassword) = cli.command {
        let mut line = String::new();
        std::io::stdin()
            .lock()
            .read_line(&mut line)
            .context("failed to read password from stdin")?;
        let hash = hash_password(line.trim_end_matches(['\r', '\n']))?;
        println!("{hash}");
        return Ok(());
    }

    let settings = Settings::load(cli.config.as_deref()).context("failed to load settings")?;
    labstock_observability::init(&settings.log.level, LogFormat::from_json_flag(settings.log.json));

    let paths = settings.store_paths();
    for dir in paths.directories() {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    let credentials = settings.credential_table();
    if credentials.is_empty() {
        tracing::warn!("no users configured; every login will be rejected");
    }
    let auth: Arc<dyn Authenticator> = Arc::new(credentials);
    let services = Arc::new(LabServices::from_settings(&settings));

    let reconciler = services.reconciler();
    match tokio::task::spawn_blocking(move || reconciler.run()).await? {
        Ok(report) => tracing::info!(
            repaired = report.repaired,
            consistent = report.consistent,
            abandoned = report.abandoned,
            failed = report.failed,
            "startup reconciliation finished"
        ),
        Err(err) => tracing::error!(error = %err, "startup reconciliation failed"),
    }

    let app = labstock_api::app::build_app(services, auth);

    let listener = tokio::net::TcpListener::bind(&settings.server.bind)
        .await
        .with_context(|| format!("failed to bind {}", settings.server.bind))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
