//! Sync Engine - mirrors a project's repositories one at a time
//!
//! For every repository the engine resolves a clone URL, decides between a
//! clone and a pull from what is already on disk, and hands the work to
//! [`GitOperations`]. Every repository ends up as exactly one [`SyncResult`];
//! nothing that goes wrong with one repository stops the run.

use crate::config::SessionConfig;
use crate::discovery::Discovery;
use crate::git::{GitOperations, PullOutcome};
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// What the engine intends to do with one repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    /// No local copy yet
    Clone {
        name: String,
        clone_url: String,
        path: PathBuf,
    },
    /// Local copy exists
    Pull { name: String, path: PathBuf },
    /// Nothing can be done
    Skip { name: String, reason: String },
}

impl SyncAction {
    pub fn name(&self) -> &str {
        match self {
            SyncAction::Clone { name, .. }
            | SyncAction::Pull { name, .. }
            | SyncAction::Skip { name, .. } => name,
        }
    }
}

/// Result of a sync operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncResult {
    /// Repository was successfully cloned
    Cloned { name: String, path: PathBuf },
    /// Repository was successfully pulled
    Pulled {
        name: String,
        path: PathBuf,
        outcome: PullOutcome,
    },
    /// Repository was skipped before any git operation
    Skipped { name: String, reason: String },
    /// Clone or pull failed
    Failed {
        name: String,
        path: PathBuf,
        error: String,
    },
}

impl fmt::Display for SyncResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncResult::Cloned { name, path } => {
                write!(f, "{}: cloned into {}", name, path.display())
            }
            SyncResult::Pulled { name, outcome, .. } => match outcome {
                PullOutcome::UpToDate => write!(f, "{}: already up to date", name),
                PullOutcome::FastForwarded => write!(f, "{}: fast-forwarded", name),
                PullOutcome::Merged { commit } => write!(f, "{}: merged ({})", name, commit),
            },
            SyncResult::Skipped { name, reason } => write!(f, "{}: skipped ({})", name, reason),
            SyncResult::Failed { name, error, .. } => write!(f, "{}: {}", name, error),
        }
    }
}

/// Results from a complete sync operation
#[derive(Debug, Clone)]
pub struct SyncSummary {
    pub total_repositories: usize,
    pub successful_operations: usize,
    pub failed_operations: usize,
    pub skipped_operations: usize,
    pub duration: Duration,
    pub results: Vec<SyncResult>,
}

impl SyncSummary {
    /// Compile sync summary from results
    pub fn compile(results: Vec<SyncResult>, duration: Duration) -> Self {
        let mut successful_operations = 0;
        let mut failed_operations = 0;
        let mut skipped_operations = 0;

        for result in &results {
            match result {
                SyncResult::Cloned { .. } | SyncResult::Pulled { .. } => successful_operations += 1,
                SyncResult::Skipped { .. } => skipped_operations += 1,
                SyncResult::Failed { .. } => failed_operations += 1,
            }
        }

        Self {
            total_repositories: results.len(),
            successful_operations,
            failed_operations,
            skipped_operations,
            duration,
            results,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &SyncResult> {
        self.results
            .iter()
            .filter(|result| matches!(result, SyncResult::Failed { .. }))
    }
}

/// Sequential clone-or-pull engine for one session
pub struct SyncEngine<D, G> {
    session: SessionConfig,
    discovery: D,
    git: G,
}

impl<D: Discovery, G: GitOperations> SyncEngine<D, G> {
    pub fn new(session: SessionConfig, discovery: D, git: G) -> Self {
        Self {
            session,
            discovery,
            git,
        }
    }

    /// Clone or pull every repository of the project
    pub async fn run(&self) -> SyncSummary {
        let start_time = Instant::now();

        info!("Starting repository synchronization");

        let names = self.discovery.list_repository_names().await;
        let mut results = Vec::with_capacity(names.len());

        for name in names {
            let action = self.plan_repository(&name).await;
            results.push(self.execute(action).await);
        }

        let summary = SyncSummary::compile(results, start_time.elapsed());

        info!(
            "Sync completed in {:.2}s: {} successful, {} failed, {} skipped",
            summary.duration.as_secs_f64(),
            summary.successful_operations,
            summary.failed_operations,
            summary.skipped_operations
        );

        summary
    }

    /// Decide what would happen to every repository without touching any of them
    pub async fn plan(&self) -> Vec<SyncAction> {
        let names = self.discovery.list_repository_names().await;
        let mut actions = Vec::with_capacity(names.len());

        for name in names {
            actions.push(self.plan_repository(&name).await);
        }

        actions
    }

    async fn plan_repository(&self, name: &str) -> SyncAction {
        let Some(clone_url) = self.discovery.resolve_clone_url(name).await else {
            let reason = format!("Failed to get clone URL for repository: {}", name);
            warn!("{}", reason);
            return SyncAction::Skip {
                name: name.to_string(),
                reason,
            };
        };

        let path = self.session.repository_path(name);
        info!("Processing repository: {}", name);

        if path.is_dir() {
            SyncAction::Pull {
                name: name.to_string(),
                path,
            }
        } else {
            SyncAction::Clone {
                name: name.to_string(),
                clone_url,
                path,
            }
        }
    }

    async fn execute(&self, action: SyncAction) -> SyncResult {
        match action {
            SyncAction::Skip { name, reason } => SyncResult::Skipped { name, reason },

            SyncAction::Clone {
                name,
                clone_url,
                path,
            } => {
                info!("Cloning repository {} from {}...", name, clone_url);

                match self
                    .git
                    .clone_repository(&clone_url, &path, &self.session.bearer_token)
                    .await
                {
                    Ok(()) => SyncResult::Cloned { name, path },
                    Err(e) => {
                        let error = format!("{:#}", e);
                        error!("Failed to clone repository: {}", error);
                        SyncResult::Failed { name, path, error }
                    }
                }
            }

            SyncAction::Pull { name, path } => {
                info!("Repository {} already exists. Pulling latest changes...", name);

                match self
                    .git
                    .pull_repository(&path, &self.session.bearer_token, &self.session.pull_email)
                    .await
                {
                    Ok(outcome) => {
                        debug!("Pull of {} finished: {:?}", name, outcome);
                        SyncResult::Pulled {
                            name,
                            path,
                            outcome,
                        }
                    }
                    Err(e) => {
                        let error = format!("{:#}", e);
                        error!("Failed to pull repository: {}", error);
                        SyncResult::Failed { name, path, error }
                    }
                }
            }
        }
    }

    /// Session this engine was built for
    pub fn session(&self) -> &SessionConfig {
        &self.session
    }
}
