use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::Local;
use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{AnnotatedCommit, Cred, FetchOptions, RemoteCallbacks, Repository, Signature, Time};
use std::path::Path;
use tracing::{debug, info};

#[cfg(test)]
use mockall::automock;

/// Username sent with the bearer token on git-over-HTTP requests
pub const BEARER_USERNAME: &str = "bearer";

/// Author and committer name of merge commits created by a pull
pub const PULL_AUTHOR_NAME: &str = "Automated Pull";

const DEFAULT_REMOTE: &str = "origin";

/// What a pull did to the local branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullOutcome {
    /// Nothing new on the remote
    UpToDate,
    /// Local branch moved forward to the fetched commit
    FastForwarded,
    /// Histories diverged and a merge commit was created
    Merged { commit: String },
}

/// Clone and pull operations used by the sync engine
#[cfg_attr(test, automock)]
#[async_trait]
pub trait GitOperations: Send + Sync {
    /// Clone `clone_url` into `local_path`
    async fn clone_repository(&self, clone_url: &str, local_path: &Path, token: &str) -> Result<()>;

    /// Fetch the upstream of the current branch and merge it
    async fn pull_repository(
        &self,
        local_path: &Path,
        token: &str,
        pull_email: &str,
    ) -> Result<PullOutcome>;
}

/// Credentials for every transport request: the fixed `bearer` user with the
/// token as password, whatever URL or credential types are asked for.
pub fn bearer_credentials(token: &str) -> (&'static str, &str) {
    (BEARER_USERNAME, token)
}

fn remote_callbacks(token: &str) -> RemoteCallbacks<'_> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |url, _username_from_url, _allowed_types| {
        debug!("Supplying bearer credentials for {}", url);
        let (username, password) = bearer_credentials(token);
        Cred::userpass_plaintext(username, password)
    });
    callbacks
}

fn fetch_options(token: &str) -> FetchOptions<'_> {
    let mut options = FetchOptions::new();
    options.remote_callbacks(remote_callbacks(token));
    options
}

/// Signature for merge commits, stamped with the current local time
fn pull_signature(email: &str) -> Result<Signature<'static>> {
    let now = Local::now();
    let time = Time::new(now.timestamp(), now.offset().local_minus_utc() / 60);

    Signature::new(PULL_AUTHOR_NAME, email, &time)
        .with_context(|| format!("Invalid pull author email {:?}", email))
}

/// libgit2-backed git operations
#[derive(Debug, Clone, Default)]
pub struct GitClient;

impl GitClient {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl GitOperations for GitClient {
    async fn clone_repository(&self, clone_url: &str, local_path: &Path, token: &str) -> Result<()> {
        let url = clone_url.to_string();
        let path = local_path.to_path_buf();
        let token = token.to_string();

        let result = tokio::task::spawn_blocking(move || clone_blocking(&url, &path, &token))
            .await
            .context("Clone task panicked")?;
        result?;

        info!("Cloned {} to {}", clone_url, local_path.display());
        Ok(())
    }

    async fn pull_repository(
        &self,
        local_path: &Path,
        token: &str,
        pull_email: &str,
    ) -> Result<PullOutcome> {
        let path = local_path.to_path_buf();
        let token = token.to_string();
        let email = pull_email.to_string();

        let outcome = tokio::task::spawn_blocking(move || pull_blocking(&path, &token, &email))
            .await
            .context("Pull task panicked")??;

        info!("Pulled latest changes for {}", local_path.display());
        Ok(outcome)
    }
}

fn clone_blocking(clone_url: &str, local_path: &Path, token: &str) -> Result<()> {
    if let Some(parent) = local_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    RepoBuilder::new()
        .fetch_options(fetch_options(token))
        .clone(clone_url, local_path)
        .with_context(|| format!("Failed to clone {}", clone_url))?;

    Ok(())
}

fn pull_blocking(local_path: &Path, token: &str, pull_email: &str) -> Result<PullOutcome> {
    let repo = Repository::open(local_path)
        .with_context(|| format!("Failed to open repository at {}", local_path.display()))?;

    let head = repo.head().context("Failed to read HEAD")?;
    if !head.is_branch() {
        bail!("HEAD is detached in {}", local_path.display());
    }
    let branch_ref = head
        .name()
        .ok_or_else(|| anyhow!("Branch name is not valid UTF-8"))?
        .to_string();
    let branch_name = head.shorthand().unwrap_or(&branch_ref).to_string();

    // Upstream from branch.<name>.remote / branch.<name>.merge
    let remote_name = repo
        .branch_upstream_remote(&branch_ref)
        .ok()
        .and_then(|buf| buf.as_str().map(str::to_string))
        .unwrap_or_else(|| DEFAULT_REMOTE.to_string());
    let merge_ref = upstream_merge_ref(&repo, &branch_name).unwrap_or_else(|| branch_ref.clone());

    debug!(
        "Fetching {} from {} into {}",
        merge_ref, remote_name, branch_name
    );

    let mut remote = repo
        .find_remote(&remote_name)
        .with_context(|| format!("Remote {} not found", remote_name))?;
    remote
        .fetch(&[merge_ref.as_str()], Some(&mut fetch_options(token)), None)
        .with_context(|| format!("Failed to fetch {} from {}", merge_ref, remote_name))?;

    let fetch_head = repo
        .find_reference("FETCH_HEAD")
        .context("Fetch did not produce FETCH_HEAD")?;
    let fetched = repo.reference_to_annotated_commit(&fetch_head)?;

    let message = format!(
        "Merge {} of {} into {}",
        merge_ref.trim_start_matches("refs/heads/"),
        remote_name,
        branch_name
    );
    merge_fetched(&repo, &branch_ref, &fetched, &message, pull_email)
}

/// `branch.<name>.merge` from the repository config, if set
fn upstream_merge_ref(repo: &Repository, branch_name: &str) -> Option<String> {
    repo.config()
        .ok()?
        .get_string(&format!("branch.{}.merge", branch_name))
        .ok()
        .filter(|merge| !merge.is_empty())
}

fn merge_fetched(
    repo: &Repository,
    branch_ref: &str,
    fetched: &AnnotatedCommit<'_>,
    message: &str,
    pull_email: &str,
) -> Result<PullOutcome> {
    let (analysis, _) = repo.merge_analysis(&[fetched])?;

    if analysis.is_up_to_date() {
        debug!("{} is up to date", branch_ref);
        return Ok(PullOutcome::UpToDate);
    }

    if analysis.is_fast_forward() {
        let target = repo.find_object(fetched.id(), None)?;
        repo.checkout_tree(&target, Some(CheckoutBuilder::new().safe()))
            .context("Failed to check out fetched commit")?;

        let mut reference = repo.find_reference(branch_ref)?;
        reference.set_target(fetched.id(), &format!("pull: Fast-forward to {}", fetched.id()))?;
        return Ok(PullOutcome::FastForwarded);
    }

    if !analysis.is_normal() {
        bail!("Cannot merge fetched commit into {}", branch_ref);
    }

    repo.merge(
        &[fetched],
        None,
        Some(CheckoutBuilder::new().safe().allow_conflicts(true)),
    )
    .context("Merge failed")?;

    // Conflicts stay in the working copy for manual resolution
    let mut index = repo.index()?;
    if index.has_conflicts() {
        let paths: Vec<String> = index
            .conflicts()?
            .filter_map(|conflict| conflict.ok())
            .filter_map(|conflict| conflict.our.or(conflict.their).or(conflict.ancestor))
            .map(|entry| String::from_utf8_lossy(&entry.path).into_owned())
            .collect();
        bail!("Merge conflicts in: {}", paths.join(", "));
    }

    let tree = repo.find_tree(index.write_tree()?)?;
    let head_commit = repo.head()?.peel_to_commit()?;
    let their_commit = repo.find_commit(fetched.id())?;
    let signature = pull_signature(pull_email)?;

    let commit = repo.commit(
        Some("HEAD"),
        &signature,
        &signature,
        message,
        &tree,
        &[&head_commit, &their_commit],
    )?;
    repo.cleanup_state()?;

    Ok(PullOutcome::Merged {
        commit: commit.to_string(),
    })
}
