//! spacemirror - mirror a JetBrains Space project's repositories locally
//!
//! Every repository of a Space project is cloned into a local directory, or
//! pulled when a working copy is already there. Authentication uses one bearer
//! token for both the HTTP API and git-over-HTTP.
//!
//! ## Modules
//!
//! - [`config`]: Session parameters and interactive input
//! - [`space`]: Space HTTP API client
//! - [`discovery`]: Repository discovery abstraction
//! - [`git`]: Clone and pull through libgit2
//! - [`sync`]: Sequential clone-or-pull engine

pub mod config;
pub mod discovery;
pub mod git;
pub mod space;
pub mod sync;

pub use config::{InputSource, PromptSource, SessionConfig, SessionOverrides};
pub use discovery::Discovery;
pub use git::{GitClient, GitOperations, PullOutcome};
pub use space::{SpaceApiError, SpaceClient};
pub use sync::{SyncAction, SyncEngine, SyncResult, SyncSummary};
