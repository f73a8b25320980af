use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use spacemirror::{
    GitClient, PromptSource, SessionConfig, SessionOverrides, SpaceClient, SyncAction, SyncEngine,
};

#[derive(Parser)]
#[command(name = "spacemirror")]
#[command(about = "Clone or pull every repository of a JetBrains Space project")]
#[command(version)]
struct Cli {
    /// Space organization URL (prompted for when omitted)
    #[arg(long)]
    url: Option<String>,

    /// Project key (prompted for when omitted)
    #[arg(long)]
    project: Option<String>,

    /// Bearer token (prompted for when omitted)
    #[arg(long, env = "SPACE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Directory receiving the working copies (prompted for when omitted)
    #[arg(long)]
    clone_dir: Option<String>,

    /// Email recorded on merge commits created by pulls (prompted for when omitted)
    #[arg(long)]
    email: Option<String>,

    /// Show what would be cloned or pulled without doing it
    #[arg(long)]
    dry_run: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;

    let overrides = SessionOverrides {
        service_url: cli.url,
        project_key: cli.project,
        bearer_token: cli.token,
        clone_directory: cli.clone_dir,
        pull_email: cli.email,
    };
    let session = SessionConfig::collect_with(&mut PromptSource::stdio(), overrides)?;

    info!("Starting spacemirror v{}", env!("CARGO_PKG_VERSION"));

    let discovery = SpaceClient::from_session(&session);
    let engine = SyncEngine::new(session, discovery, GitClient::new());

    if cli.dry_run {
        cmd_plan(&engine).await;
    } else {
        cmd_sync(&engine).await;
    }

    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    // stderr keeps the prompts and the summary on stdout readable
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    Ok(())
}

/// Print the clone/pull plan
async fn cmd_plan(engine: &SyncEngine<SpaceClient, GitClient>) {
    println!("\n🔍 Dry run mode - planning repository synchronization");

    let actions = engine.plan().await;

    let mut to_clone = 0;
    let mut to_pull = 0;
    let mut to_skip = 0;

    for action in &actions {
        match action {
            SyncAction::Clone {
                clone_url, path, ..
            } => {
                to_clone += 1;
                println!("   📥 Clone: {} -> {}", clone_url, path.display());
            }
            SyncAction::Pull { path, .. } => {
                to_pull += 1;
                println!("   🔄 Pull: {} ({})", action.name(), path.display());
            }
            SyncAction::Skip { reason, .. } => {
                to_skip += 1;
                println!("   ⏭️  Skip: {}", reason);
            }
        }
    }

    println!("\n📈 Summary:");
    println!("   📥 Repositories to clone: {}", to_clone);
    println!("   🔄 Repositories to pull: {}", to_pull);
    println!("   ⏭️  Repositories to skip: {}", to_skip);
}

/// Sync every repository and print the run summary
async fn cmd_sync(engine: &SyncEngine<SpaceClient, GitClient>) {
    println!(
        "\n🔄 Synchronizing project {} into {}",
        engine.session().project_key,
        engine.session().clone_directory
    );

    let summary = engine.run().await;

    println!("\n🎉 Synchronization Complete!");
    println!("   📊 Total repositories: {}", summary.total_repositories);
    println!(
        "   ✅ Successful operations: {}",
        summary.successful_operations
    );
    println!("   ❌ Failed operations: {}", summary.failed_operations);
    println!("   ⏭️  Skipped operations: {}", summary.skipped_operations);
    println!("   ⏱️  Duration: {:.2}s", summary.duration.as_secs_f64());

    if summary.failed_operations > 0 {
        println!("\n🔍 Failed Operations:");
        for result in summary.failures() {
            println!("   ❌ {}", result);
        }
    }
}
