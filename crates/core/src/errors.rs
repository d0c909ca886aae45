//! Error types for the forkmirror core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    GitHub(#[from] GitHubError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Event(#[from] EventError),

    #[error(transparent)]
    Mirror(#[from] MirrorError),
}

// ---------------------------------------------------------------------------
// Git errors
// ---------------------------------------------------------------------------

/// Errors from local Git (git2) operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// A `git2` library error.
    #[error("git2 error: {0}")]
    Git2Error(#[from] git2::Error),

    /// A ref (branch, tag, SHA) could not be resolved.
    #[error("git ref not found: {0}")]
    RefNotFound(String),

    /// Fetching a ref from a remote failed (deleted fork, network fault).
    #[error("git fetch of '{ref_name}' from '{remote}' failed: {detail}")]
    FetchFailed {
        remote: String,
        ref_name: String,
        detail: String,
    },

    /// Push was rejected (e.g. non-fast-forward).
    #[error("git push rejected for branch '{branch}': {detail}")]
    PushRejected {
        branch: String,
        detail: String,
    },

    /// Generic I/O wrapper.
    #[error("git I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// GitHub API errors
// ---------------------------------------------------------------------------

/// Errors from GitHub REST API interactions.
#[derive(Debug, Error)]
pub enum GitHubError {
    /// HTTP-level transport error (network, TLS, etc.).
    #[error("GitHub HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The API returned a non-success status code.
    #[error("GitHub API error (HTTP {status}): {body}")]
    ApiError {
        status: u16,
        body: String,
    },

    /// Authentication token is missing or invalid.
    #[error("GitHub authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Rate limit exceeded.
    #[error("GitHub rate limit exceeded, resets at {reset_at}")]
    RateLimited {
        reset_at: String,
    },

    /// JSON deserialization failure.
    #[error("GitHub response parse error: {0}")]
    ParseError(String),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A required environment variable is not set.
    #[error("required environment variable '{var}' is not set (referenced by config field '{field}')")]
    EnvVarMissing {
        var: String,
        field: String,
    },

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue {
        field: String,
        detail: String,
    },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Event boundary errors
// ---------------------------------------------------------------------------

/// Errors from parsing the incoming pull-request event payload.
#[derive(Debug, Error)]
pub enum EventError {
    /// The payload is not valid JSON or not a pull-request event.
    #[error("event payload parse error: {0}")]
    ParseError(String),

    /// A field the pipeline depends on is absent from the payload.
    #[error("event payload is missing required field '{0}'")]
    MissingField(String),
}

// ---------------------------------------------------------------------------
// Mirror pipeline errors
// ---------------------------------------------------------------------------

/// Hard failures inside the mirror pipeline.
///
/// User-actionable stops (branch-name conflict, unsynced fork base) are not
/// errors -- they are reported as pipeline outcomes. This enum covers the
/// conditions that end a run abnormally.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// No open mirror PR exists for a branch that was just updated.
    /// Terminal for the annotation step, but the branch push already landed.
    #[error("no open mirror pull request found for branch '{0}'")]
    MirrorPrMissing(String),

    /// More than one open mirror PR matches the same head branch.
    /// Invariant violation: exactly one mirror PR may exist per branch.
    #[error("{count} open mirror pull requests found for branch '{branch}', expected exactly one")]
    MultipleMirrorPrs {
        branch: String,
        count: usize,
    },

    /// Underlying git transport error during mirroring.
    #[error("mirror git error: {0}")]
    GitError(#[from] GitError),

    /// Underlying GitHub API error during mirroring.
    #[error("mirror GitHub error: {0}")]
    GitHubError(#[from] GitHubError),
}
