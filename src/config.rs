use anyhow::{Context, Result};
use std::fmt;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

/// Prompts shown for each session value, in the order they are collected
pub const URL_PROMPT: &str =
    "Enter your JetBrains Space organization URL (e.g., https://your-org.jetbrains.space): ";
pub const PROJECT_PROMPT: &str = "Enter your project Key: ";
pub const TOKEN_PROMPT: &str = "Enter your Bearer Token: ";
pub const CLONE_DIR_PROMPT: &str = "Enter the directory where you want to clone the repositories: ";
pub const EMAIL_PROMPT: &str = "Email for pull: ";

/// Parameters for a single synchronization run
///
/// Values are taken verbatim from the input source. Nothing is validated here;
/// a bad URL or directory surfaces later as an HTTP or git failure.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Space organization URL, e.g. `https://acme.jetbrains.space`
    pub service_url: String,

    /// Key of the project whose repositories are mirrored
    pub project_key: String,

    /// Bearer token for the HTTP API, reused as the git password
    pub bearer_token: String,

    /// Directory that receives one working copy per repository
    pub clone_directory: String,

    /// Email recorded on merge commits created by pulls
    pub pull_email: String,
}

/// Values supplied up front (flags, environment) that skip their prompt
#[derive(Debug, Clone, Default)]
pub struct SessionOverrides {
    pub service_url: Option<String>,
    pub project_key: Option<String>,
    pub bearer_token: Option<String>,
    pub clone_directory: Option<String>,
    pub pull_email: Option<String>,
}

/// Source of interactive session values
pub trait InputSource {
    /// Show `prompt` and return the next value without its line terminator
    fn read_value(&mut self, prompt: &str) -> Result<String>;
}

/// Line-oriented prompt over any reader/writer pair
pub struct PromptSource<R, W> {
    reader: R,
    writer: W,
}

impl<R: BufRead, W: Write> PromptSource<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Give back the reader and writer, mostly useful for inspecting test buffers
    pub fn into_parts(self) -> (R, W) {
        (self.reader, self.writer)
    }
}

impl PromptSource<io::StdinLock<'static>, io::Stdout> {
    /// Prompt on stdout and read answers from stdin
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> InputSource for PromptSource<R, W> {
    fn read_value(&mut self, prompt: &str) -> Result<String> {
        write!(self.writer, "{}", prompt).context("Failed to write prompt")?;
        self.writer.flush().context("Failed to flush prompt")?;

        let mut line = String::new();
        self.reader
            .read_line(&mut line)
            .context("Failed to read input")?;

        // End of input reads as an empty value
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }

        Ok(line)
    }
}

impl SessionConfig {
    /// Collect all five values from `source` in the fixed prompt order
    pub fn collect(source: &mut dyn InputSource) -> Result<Self> {
        Self::collect_with(source, SessionOverrides::default())
    }

    /// Collect session values, prompting only for those missing from `overrides`
    pub fn collect_with(source: &mut dyn InputSource, overrides: SessionOverrides) -> Result<Self> {
        let mut value = |preset: Option<String>, prompt: &str| -> Result<String> {
            match preset {
                Some(v) => Ok(v),
                None => source.read_value(prompt),
            }
        };

        Ok(Self {
            service_url: value(overrides.service_url, URL_PROMPT)?,
            project_key: value(overrides.project_key, PROJECT_PROMPT)?,
            bearer_token: value(overrides.bearer_token, TOKEN_PROMPT)?,
            clone_directory: value(overrides.clone_directory, CLONE_DIR_PROMPT)?,
            pull_email: value(overrides.pull_email, EMAIL_PROMPT)?,
        })
    }

    /// Local working copy location for a repository
    pub fn repository_path(&self, repo_name: &str) -> PathBuf {
        PathBuf::from(&self.clone_directory).join(repo_name)
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("service_url", &self.service_url)
            .field("project_key", &self.project_key)
            .field("bearer_token", &"<redacted>")
            .field("clone_directory", &self.clone_directory)
            .field("pull_email", &self.pull_email)
            .finish()
    }
}
