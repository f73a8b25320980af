//! Repository discovery abstraction layer
//!
//! The sync engine only needs two things from a hosting service: the names of
//! the repositories to mirror and, for each of them, a clone URL. Failures are
//! reported by the implementation and come back as "nothing found".

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

/// Source of repositories to mirror
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Names of all repositories, in the order the service returns them.
    /// Empty when the listing fails.
    async fn list_repository_names(&self) -> Vec<String>;

    /// HTTP clone URL for one repository, `None` when it cannot be resolved
    async fn resolve_clone_url(&self, repo_name: &str) -> Option<String>;
}
