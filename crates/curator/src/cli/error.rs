//! User-facing errors for CLI commands
//!
//! Every error carries:
//! - What went wrong
//! - The exit code it maps to
//! - Optional context and `TRY:` suggestions

use curator::error::exit_code;
use curator::CuratorError;
use serde::Serialize;
use std::fmt;
use std::path::Path;

/// An error with an exit code, context and suggestions
#[derive(Debug)]
pub struct CliError {
    /// The main error message
    pub message: String,
    /// Process exit code
    pub code: u8,
    /// Additional context about what was happening
    pub context: Option<String>,
    /// Suggestions for how to fix the error
    pub suggestions: Vec<String>,
}

/// Machine-readable error envelope printed on stdout in `--json` mode.
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope<'a> {
    pub error: &'a str,
    pub code: u8,
}

impl CliError {
    pub fn new(message: impl Into<String>, code: u8) -> Self {
        Self {
            message: message.into(),
            code,
            context: None,
            suggestions: Vec::new(),
        }
    }

    /// Bad arguments (exit code 3)
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(message, exit_code::INVALID_INPUT)
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_suggestions(
        mut self,
        suggestions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.suggestions.extend(suggestions.into_iter().map(|s| s.into()));
        self
    }

    // === Common error constructors ===

    /// `trash-empty` without confirmation
    pub fn confirmation_required(command: &str) -> Self {
        Self::invalid_input(format!("'{}' permanently deletes files and requires --yes", command))
            .with_suggestion(format!("TRY: curator <repo> {} --yes", command))
    }

    /// Batch command with no filename source
    pub fn no_filenames() -> Self {
        Self::invalid_input("No filenames provided").with_suggestions([
            "TRY: --files a.txt b.txt",
            "TRY: --from-file list.txt (one path per line)",
            "TRY: printf 'a.txt\\n' | curator <repo> status-batch --stdin ...",
        ])
    }

    /// Unreadable `--from-file` list
    pub fn cannot_read_list(path: &Path, reason: &str) -> Self {
        Self::invalid_input(format!("Cannot read file list: {}", path.display()))
            .with_context(reason.to_string())
            .with_suggestion(format!("TRY: Check the file exists: ls -la {}", path.display()))
    }

    /// Translate a library error, adding hints where there is something to try.
    pub fn from_curator(err: &CuratorError) -> Self {
        let base = Self::new(err.to_string(), err.exit_code());
        match err {
            CuratorError::LockTimeout { .. } => base
                .with_context("Another curator process is holding the repository lock")
                .with_suggestions([
                    "TRY: Wait for the other command to finish and retry",
                    "TRY: Raise the timeout with CURATOR_LOCK_TIMEOUT_MS",
                ]),
            CuratorError::StateCorrupt { .. } => base.with_suggestion(
                "TRY: Inspect the .curator_state.json.bak.* files and copy a good one back",
            ),
            CuratorError::Ambiguous { path, .. } => base.with_suggestion(format!(
                "TRY: Move the intended copy back by hand, then run: curator <repo> status {} decide_later",
                path
            )),
            CuratorError::NotFound(_) => {
                base.with_suggestion("TRY: Pass --force to record a decision for a missing file")
            }
            _ => base,
        }
    }

    /// Best description of an arbitrary command failure.
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        if let Some(cli) = err.downcast_ref::<CliError>() {
            return Self {
                message: cli.message.clone(),
                code: cli.code,
                context: cli.context.clone(),
                suggestions: cli.suggestions.clone(),
            };
        }
        if let Some(curator) = err.downcast_ref::<CuratorError>() {
            return Self::from_curator(curator);
        }
        Self::new(format!("{:#}", err), exit_code::UNEXPECTED)
    }

    /// Print to stdout as JSON or to stderr as text.
    pub fn report(&self, json: bool) {
        if json {
            let envelope = ErrorEnvelope {
                error: &self.message,
                code: self.code,
            };
            match serde_json::to_string(&envelope) {
                Ok(line) => println!("{}", line),
                Err(_) => println!(r#"{{"error":"unprintable error","code":{}}}"#, self.code),
            }
        } else {
            eprint!("{}", self);
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Error: {}", self.message)?;

        if let Some(ctx) = &self.context {
            writeln!(f, "CONTEXT: {}", ctx)?;
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            for suggestion in &self.suggestions {
                writeln!(f, "  {}", suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for CliError {}
