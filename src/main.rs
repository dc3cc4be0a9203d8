use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use boards_onboarding::config::{OnboardingConfig, StoreConfig};
use boards_onboarding::model::{Block, Container};
use boards_onboarding::onboarding::{OnboardingManager, TourState};
use boards_onboarding::store::{BlockStore, LibSqlBackend};

/// Acting user recorded on seeded template blocks.
const SYSTEM_USER: &str = "system";

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load a JSON array of blocks into the template workspace
    SeedTemplate { path: PathBuf },
    /// Provision a user's workspace and welcome board and start the tour
    Prepare { user_id: String },
    /// Show a user's onboarding tour state
    Status { user_id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let store_config = StoreConfig::from_env();
    let onboarding_config = OnboardingConfig::from_env()?;

    let db = Arc::new(
        LibSqlBackend::new_local(&store_config.db_path)
            .await
            .with_context(|| format!("opening {}", store_config.db_path.display()))?,
    );
    let manager = OnboardingManager::new(db.clone(), onboarding_config);

    match cli.command {
        Command::SeedTemplate { path } => seed_template(&db, manager.config(), &path).await?,
        Command::Prepare { user_id } => {
            let prepared = manager.prepare_onboarding_tour(&user_id).await?;
            let blocks = db
                .list_blocks(&Container::new(prepared.workspace_id.as_str()))
                .await?;
            tracing::info!(blocks = blocks.len(), "Workspace populated");
            println!("{}", serde_json::to_string_pretty(&prepared)?);
        }
        Command::Status { user_id } => match manager.tour_state(&user_id).await? {
            TourState::NoTour => println!("{user_id}: no tour"),
            TourState::Started { step, category } => {
                println!("{user_id}: tour started, category {category}, step {step}");
            }
        },
    }

    Ok(())
}

/// Load a JSON array of blocks into the template workspace.
async fn seed_template(
    db: &LibSqlBackend,
    config: &OnboardingConfig,
    path: &Path,
) -> anyhow::Result<()> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let blocks: Vec<Block> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing blocks from {}", path.display()))?;

    if !blocks.iter().any(|b| b.id == config.template_root_id) {
        tracing::warn!(
            root_id = %config.template_root_id,
            "Seed file does not contain the configured template root"
        );
    }

    let container = Container::new(config.template_workspace_id.as_str());
    for block in &blocks {
        db.insert_block(&container, block, SYSTEM_USER).await?;
    }
    tracing::info!(
        count = blocks.len(),
        workspace_id = %container.workspace_id,
        "Template seeded"
    );
    Ok(())
}
