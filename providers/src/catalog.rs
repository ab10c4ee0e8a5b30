//! Installed-model discovery.
//!
//! `ollama list` prints a header row followed by one model per line:
//!
//! ```text
//! NAME              ID            SIZE      MODIFIED
//! llama3:latest     365c0bd3c000  4.7 GB    2 days ago
//! mistral:7b        f974a74358d6  4.1 GB    3 weeks ago
//! ```

use std::io;
use std::process::ExitStatus;

use thiserror::Error;
use tokio::process::Command;

/// Offered when the model list cannot be read.
pub const FALLBACK_MODELS: [&str; 2] = ["llama3", "mistral"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    pub models: Vec<String>,
    /// The installed list could not be read.
    pub fallback: bool,
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("could not run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("exited with {status}: {stderr}")]
    Failed { status: ExitStatus, stderr: String },
    #[error("output is not UTF-8")]
    NotUtf8,
    #[error("model list is empty")]
    Empty,
}

#[derive(Debug, Clone)]
pub struct ModelCatalog {
    command: String,
    args: Vec<String>,
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::new("ollama", ["list"])
    }
}

impl ModelCatalog {
    #[must_use]
    pub fn new<I, S>(command: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Build from a `[program, args...]` list. An empty list means the default.
    #[must_use]
    pub fn from_argv(argv: &[String]) -> Self {
        match argv.split_first() {
            Some((program, args)) => Self::new(program.clone(), args.iter().cloned()),
            None => Self::default(),
        }
    }

    /// Names of installed models, or [`FALLBACK_MODELS`] when discovery fails.
    pub async fn list_models(&self) -> Vec<String> {
        self.discover().await.models
    }

    /// Like [`ModelCatalog::list_models`], also reporting whether the list is the fallback.
    pub async fn discover(&self) -> Discovery {
        match self.run().await {
            Ok(models) => {
                tracing::debug!(count = models.len(), "installed models listed");
                Discovery {
                    models,
                    fallback: false,
                }
            }
            Err(e) => {
                tracing::warn!(command = %self.command, "model discovery failed: {e}; using fallback");
                Discovery {
                    models: FALLBACK_MODELS.iter().map(ToString::to_string).collect(),
                    fallback: true,
                }
            }
        }
    }

    async fn run(&self) -> Result<Vec<String>, DiscoveryError> {
        let output = Command::new(&self.command)
            .args(&self.args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| DiscoveryError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(DiscoveryError::Failed {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8(output.stdout).map_err(|_| DiscoveryError::NotUtf8)?;
        let models = parse_model_list(&stdout);
        if models.is_empty() {
            return Err(DiscoveryError::Empty);
        }
        Ok(models)
    }
}

/// First column of every non-blank line after the header.
#[must_use]
pub fn parse_model_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .skip(1)
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect()
}
