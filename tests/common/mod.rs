//! Common test utilities and helpers for spacemirror tests
#![allow(dead_code)]

use git2::{Commit, Oid, Repository, Signature};
use std::path::Path;
use tempfile::TempDir;

/// Scratch directories for an upstream repository and a local mirror
pub struct TestEnvironment {
    pub upstream_dir: TempDir,
    pub mirror_dir: TempDir,
    pub upstream: Repository,
}

impl TestEnvironment {
    /// Upstream repository with a single commit adding README.md
    pub fn new() -> Self {
        let upstream_dir = TempDir::new().expect("Failed to create temp dir");
        let mirror_dir = TempDir::new().expect("Failed to create temp dir");

        let upstream = Repository::init(upstream_dir.path()).expect("Failed to init upstream");
        commit_file(&upstream, "README.md", "# web\n", "Initial commit");

        Self {
            upstream_dir,
            mirror_dir,
            upstream,
        }
    }

    /// Clone URL of the upstream repository (a local path)
    pub fn upstream_url(&self) -> String {
        self.upstream_dir
            .path()
            .to_str()
            .expect("Temp path is not UTF-8")
            .to_string()
    }

    /// Where the mirror copy of `name` lives
    pub fn mirror_path(&self, name: &str) -> std::path::PathBuf {
        self.mirror_dir.path().join(name)
    }
}

/// Write `content` to `file`, stage it and commit on the current branch
pub fn commit_file(repo: &Repository, file: &str, content: &str, message: &str) -> Oid {
    let workdir = repo.workdir().expect("Repository has no working directory");
    std::fs::write(workdir.join(file), content).expect("Failed to write file");

    let mut index = repo.index().expect("Failed to open index");
    index.add_path(Path::new(file)).expect("Failed to stage file");
    index.write().expect("Failed to write index");

    let tree_id = index.write_tree().expect("Failed to write tree");
    let tree = repo.find_tree(tree_id).expect("Failed to find tree");
    let signature = Signature::now("Test Author", "author@example.com").unwrap();

    let parent = repo.head().ok().and_then(|head| head.peel_to_commit().ok());
    let parents: Vec<&Commit> = parent.iter().collect();

    repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
        .expect("Failed to commit")
}

/// Assertion helper for log and console output
pub fn assert_contains_all(text: &str, expected: &[&str]) {
    for item in expected {
        assert!(
            text.contains(item),
            "Expected text to contain '{}', but it didn't. Text: {}",
            item,
            text
        );
    }
}
