//! Error handling for the component updater
//!
//! The updater is built from stages that each own their failure modes, so
//! errors are split the same way:
//!
//! - [`CheckError`] - release registry queries (Version Source Client)
//! - [`FetchError`] - artifact downloads and checksum verification
//! - [`InstallError`] - the staged install state machine
//! - [`UpdaterError`] - configuration and command-level failures
//!
//! Stage errors are strongly typed so callers can match on them: the
//! scheduler, for example, treats [`CheckError::NotFound`] differently from an
//! install that was attempted and failed. Command-line code works in
//! [`anyhow::Result`] and converts whatever bubbles up into an
//! [`ErrorContext`] with [`user_friendly_error`] before printing it.
//!
//! # Examples
//!
//! ```rust,no_run
//! use component_updater::core::{CheckError, user_friendly_error};
//!
//! let err = anyhow::Error::from(CheckError::NotFound);
//! let ctx = user_friendly_error(err);
//! ctx.display(); // coloured error with a suggestion
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// Failure while asking the release registry for the latest version.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckError {
    /// The repository or its latest release does not exist (HTTP 404).
    #[error("repository or release not found")]
    NotFound,

    /// The registry answered with a status other than 200 or 404.
    ///
    /// Treated as transient.
    #[error("registry returned HTTP {0}")]
    Status(u16),

    /// Timeout or transport failure.
    #[error("network error while querying registry: {0}")]
    Network(String),

    /// The response carried no usable version tag or was not valid JSON.
    #[error("malformed release response: {0}")]
    Malformed(String),
}

impl CheckError {
    /// Build a [`CheckError`] from a transport-level reqwest failure.
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Network("request timed out".to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Failure while downloading or verifying a release artifact.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The artifact server answered with a non-200 status.
    #[error("download failed with HTTP {0}")]
    HttpStatus(u16),

    /// Timeout or transport failure during the transfer.
    #[error("network error during download: {0}")]
    Network(String),

    /// The scratch file could not be written.
    #[error("cannot write download to disk: {0}")]
    Io(String),

    /// The archive does not match the published checksum.
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Checksum published alongside the release
        expected: String,
        /// Checksum computed from the downloaded file
        actual: String,
    },
}

/// Failure of the staged install state machine.
///
/// Every variant except [`InstallError::IrrecoverableState`] guarantees the
/// live tree is exactly what it was before the install began.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InstallError {
    /// The archive could not be opened or extracted.
    #[error("corrupt archive: {0}")]
    CorruptArchive(String),

    /// No directory inside the archive looks like the component root.
    #[error("component payload not found in archive")]
    PayloadNotFound,

    /// Copying the live tree or overlaying the payload failed.
    #[error("failed to prepare staging tree: {0}")]
    Staging(String),

    /// The release does not ship every required file.
    #[error("release is missing required files: {}", .0.join(", "))]
    MissingRequiredFiles(Vec<String>),

    /// The staged manifest could not be parsed or rewritten.
    #[error("invalid manifest in staged tree: {0}")]
    InvalidManifest(String),

    /// The rename sequence failed; the original live tree was put back.
    #[error("atomic swap failed: {0}")]
    SwapFailed(String),

    /// Recovery failed. The live tree may be missing or inconsistent and a
    /// human has to look at it.
    #[error("irrecoverable install state: {0}")]
    IrrecoverableState(String),
}

impl InstallError {
    /// Whether the live tree is guaranteed to be untouched.
    #[must_use]
    pub const fn live_tree_intact(&self) -> bool {
        !matches!(self, Self::IrrecoverableState(_))
    }
}

/// Top-level error for configuration and command handling.
#[derive(Error, Debug)]
pub enum UpdaterError {
    /// Configuration file is missing or invalid
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration problem
        message: String,
    },

    /// The live tree has no readable manifest
    #[error("Manifest not readable at {path}: {reason}")]
    ManifestUnreadable {
        /// Path of the manifest
        path: String,
        /// Why it could not be read
        reason: String,
    },

    /// Nothing to roll back to
    #[error("No backup found at {path}")]
    BackupNotFound {
        /// Expected backup location
        path: String,
    },

    /// Registry check failed
    #[error(transparent)]
    Check(#[from] CheckError),

    /// Download failed
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Install failed
    #[error(transparent)]
    Install(#[from] InstallError),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// Semver parsing error
    #[error("Semver parsing error: {0}")]
    SemverError(#[from] semver::Error),

    /// Generic error
    #[error("{message}")]
    Other {
        /// Error message
        message: String,
    },
}

/// An error paired with optional details and a suggested fix.
///
/// ```rust,no_run
/// use component_updater::core::{ErrorContext, UpdaterError};
///
/// let context = ErrorContext::new(UpdaterError::ConfigError {
///     message: "missing [source] repository".to_string(),
/// })
/// .with_suggestion("Set source.repository to owner/name");
///
/// context.display();
/// ```
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: UpdaterError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a context with no suggestion or details.
    #[must_use]
    pub const fn new(error: UpdaterError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr: error in red, details in yellow,
    /// suggestion in green.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] with actionable suggestions.
///
/// Recognizes the stage errors and common IO failures; anything else is
/// reported with its full cause chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(err) = error.downcast_ref::<CheckError>() {
        return check_error_context(err.clone());
    }

    if let Some(err) = error.downcast_ref::<FetchError>() {
        return fetch_error_context(err.clone());
    }

    if let Some(err) = error.downcast_ref::<InstallError>() {
        return install_error_context(err.clone());
    }

    if let Some(err) = error.downcast_ref::<UpdaterError>() {
        match err {
            UpdaterError::Check(e) => return check_error_context(e.clone()),
            UpdaterError::Fetch(e) => return fetch_error_context(e.clone()),
            UpdaterError::Install(e) => return install_error_context(e.clone()),
            UpdaterError::BackupNotFound {
                path,
            } => {
                return ErrorContext::new(UpdaterError::BackupNotFound {
                    path: path.clone(),
                })
                .with_suggestion("A backup is created at the start of every install; run an update first")
                .with_details("Rollback restores the copy taken before the most recent install");
            }
            UpdaterError::ConfigError {
                message,
            } => {
                return ErrorContext::new(UpdaterError::ConfigError {
                    message: message.clone(),
                })
                .with_suggestion("Check the config file passed with --config or COMPONENT_UPDATER_CONFIG");
            }
            _ => {}
        }
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>()
        && io_error.kind() == std::io::ErrorKind::PermissionDenied
    {
        return ErrorContext::new(UpdaterError::Other {
            message: error.to_string(),
        })
        .with_suggestion("Check that the updater may write to the live tree's parent directory")
        .with_details("Backup, staging and swap directories are created next to the live tree");
    }

    if let Some(toml_error) = error.downcast_ref::<toml::de::Error>() {
        return ErrorContext::new(UpdaterError::ConfigError {
            message: toml_error.to_string(),
        })
        .with_suggestion("Check the TOML syntax of the config file");
    }

    let mut message = error.to_string();
    let chain: Vec<String> =
        error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(UpdaterError::Other {
        message,
    })
}

fn check_error_context(error: CheckError) -> ErrorContext {
    let suggestion = match &error {
        CheckError::NotFound => {
            "Check source.repository and that the repository has a published release"
        }
        CheckError::Status(_) | CheckError::Network(_) => {
            "Check network connectivity; the registry may also be rate limiting this host"
        }
        CheckError::Malformed(_) => "The latest release tag must look like v1.2.3",
    };
    ErrorContext::new(UpdaterError::Check(error)).with_suggestion(suggestion)
}

fn fetch_error_context(error: FetchError) -> ErrorContext {
    match &error {
        FetchError::ChecksumMismatch {
            ..
        } => ErrorContext::new(UpdaterError::Fetch(error.clone()))
            .with_details("The downloaded archive does not match the checksum published with the release")
            .with_suggestion("Retry later; if it persists the release assets may have been replaced"),
        FetchError::Io(_) => ErrorContext::new(UpdaterError::Fetch(error.clone()))
            .with_suggestion("Check free space in the system temporary directory"),
        _ => ErrorContext::new(UpdaterError::Fetch(error.clone()))
            .with_suggestion("Check network connectivity and the artifact URL"),
    }
}

fn install_error_context(error: InstallError) -> ErrorContext {
    let ctx = ErrorContext::new(UpdaterError::Install(error.clone()));
    match error {
        InstallError::IrrecoverableState(_) => ctx
            .with_details("Automatic recovery failed; the live tree may be missing or half-written")
            .with_suggestion(
                "Inspect the .old and .backup directories next to the live tree and restore one by hand",
            ),
        InstallError::PayloadNotFound | InstallError::MissingRequiredFiles(_) => ctx
            .with_details("The live tree was not modified")
            .with_suggestion("Check the release archive layout and component.required_files"),
        _ => ctx.with_details("The live tree was not modified"),
    }
}
