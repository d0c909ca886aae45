//! TOML-based configuration system for forkmirror.
//!
//! All sensitive values (the GitHub token) are stored as `_env` fields that
//! reference environment variable names. The actual secrets are resolved at
//! runtime via [`AppConfig::resolve_env_vars`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ConfigError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Trusted upstream repository and API settings.
    pub github: GitHubConfig,

    /// Mirror PR presentation settings.
    #[serde(default)]
    pub mirror: MirrorConfig,

    /// Runner settings (logging, scratch workspace).
    #[serde(default)]
    pub runner: RunnerConfig,
}

// ---------------------------------------------------------------------------
// GitHub
// ---------------------------------------------------------------------------

/// Trusted upstream repository and API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// GitHub API base URL (default `https://api.github.com`).
    #[serde(default = "default_github_api_url")]
    pub api_url: String,

    /// Trusted upstream repository in `owner/repo` format.
    pub repo: String,

    /// Environment variable holding the access token with push rights on the
    /// upstream repository.
    pub token_env: String,

    /// Trunk branch of the upstream repository (e.g. `main`).
    #[serde(default = "default_trunk_branch")]
    pub trunk_branch: String,

    /// Explicit Git base URL override for enterprise hosts. When unset, the
    /// base is derived from `api_url`.
    #[serde(default)]
    pub git_base_url: Option<String>,

    /// Resolved token (populated by `resolve_env_vars`).
    #[serde(skip)]
    pub token: Option<String>,
}

fn default_github_api_url() -> String {
    "https://api.github.com".into()
}
fn default_trunk_branch() -> String {
    "main".into()
}

impl GitHubConfig {
    /// The `owner` half of the `owner/repo` pair.
    pub fn owner(&self) -> &str {
        self.repo.split('/').next().unwrap_or(&self.repo)
    }

    /// Derive the Git base URL (without repo path).
    ///
    /// Resolution order:
    /// 1. Explicit `git_base_url` when set and non-empty.
    /// 2. Otherwise derived from `api_url`:
    ///    `https://api.github.com` becomes `https://github.com`, a GHES
    ///    `https://<host>/api/v3` becomes `https://<host>`, and anything
    ///    else is used as-is with trailing slashes stripped.
    pub fn git_base(&self) -> String {
        if let Some(ref explicit) = self.git_base_url {
            let trimmed = explicit.trim();
            if !trimmed.is_empty() {
                return trimmed.trim_end_matches('/').to_string();
            }
        }

        let url = self.api_url.trim().trim_end_matches('/');
        if url.eq_ignore_ascii_case("https://api.github.com") {
            return "https://github.com".to_string();
        }
        if let Some(base) = url.strip_suffix("/api/v3") {
            return base.to_string();
        }
        url.to_string()
    }

    /// HTTPS clone/push URL for the trusted upstream repository.
    pub fn upstream_git_url(&self) -> String {
        format!("{}/{}.git", self.git_base(), self.repo)
    }
}

// ---------------------------------------------------------------------------
// Mirror PR presentation
// ---------------------------------------------------------------------------

/// Settings controlling how mirror pull requests are presented.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// Title prefix marking a mirror PR as a generated preview copy.
    #[serde(default = "default_title_prefix")]
    pub title_prefix: String,
}

fn default_title_prefix() -> String {
    "[mirror]".into()
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            title_prefix: default_title_prefix(),
        }
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Runner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Directory for the scratch git workspace.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_log_level() -> String {
    "info".into()
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/forkmirror")
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            data_dir: default_data_dir(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load an [`AppConfig`] from a TOML file at the given path.
    ///
    /// This does **not** resolve environment variables -- call
    /// [`resolve_env_vars`](Self::resolve_env_vars) afterwards.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Resolve all `*_env` fields from environment variables and populate the
    /// corresponding resolved fields.
    ///
    /// A missing variable logs a warning but does **not** fail -- the caller
    /// decides what is required for its execution mode.
    pub fn resolve_env_vars(&mut self) -> Result<(), ConfigError> {
        info!("resolving environment variable references in config");
        self.github.token = resolve_optional_env(&self.github.token_env, "github.token_env");
        Ok(())
    }

    /// Validate that all required fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.github.repo.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "github.repo".into(),
                detail: "upstream repo must not be empty".into(),
            });
        }
        if !self.github.repo.contains('/') {
            return Err(ConfigError::InvalidValue {
                field: "github.repo".into(),
                detail: "upstream repo must be in 'owner/repo' format".into(),
            });
        }
        if self.github.trunk_branch.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "github.trunk_branch".into(),
                detail: "trunk branch must not be empty".into(),
            });
        }
        if self.github.token_env.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "github.token_env".into(),
                detail: "token env var name must not be empty".into(),
            });
        }
        Ok(())
    }

    /// Convenience: load, resolve, and validate in one call.
    pub fn load_and_resolve<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.resolve_env_vars()?;
        config.validate()?;
        Ok(config)
    }
}

/// Try to read an environment variable by name. Returns `Some(value)` on
/// success; logs a warning and returns `None` if the variable is unset.
fn resolve_optional_env(env_name: &str, field: &str) -> Option<String> {
    match std::env::var(env_name) {
        Ok(val) if !val.is_empty() => {
            debug!(field, env_name, "resolved env var");
            Some(val)
        }
        Ok(_) => {
            warn!(field, env_name, "env var is set but empty");
            None
        }
        Err(_) => {
            warn!(field, env_name, "env var not set");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_toml() -> &'static str {
        r#"
[github]
api_url = "https://api.github.com"
repo = "acme/widget"
token_env = "GITHUB_TOKEN"
trunk_branch = "main"

[mirror]
title_prefix = "[mirror]"

[runner]
log_level = "debug"
data_dir = "/tmp/forkmirror"
"#
    }

    #[test]
    fn test_parse_full_config() {
        let config: AppConfig = toml::from_str(sample_toml()).expect("failed to parse toml");
        assert_eq!(config.github.repo, "acme/widget");
        assert_eq!(config.github.trunk_branch, "main");
        assert_eq!(config.mirror.title_prefix, "[mirror]");
        assert_eq!(config.runner.log_level, "debug");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(sample_toml().as_bytes()).unwrap();

        let config = AppConfig::load_from_file(&path).expect("load_from_file failed");
        assert_eq!(config.github.owner(), "acme");
    }

    #[test]
    fn test_file_not_found() {
        let result = AppConfig::load_from_file("/nonexistent/config.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_validate_rejects_bad_repo_format() {
        let mut config: AppConfig = toml::from_str(sample_toml()).unwrap();
        config.github.repo = "noslash".into();
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "github.repo"
        ));
    }

    #[test]
    fn test_resolve_env_vars() {
        std::env::set_var("TEST_FM_TOKEN", "ghp_abc");
        let mut config: AppConfig = toml::from_str(
            r#"
[github]
repo = "acme/widget"
token_env = "TEST_FM_TOKEN"
"#,
        )
        .unwrap();
        config.resolve_env_vars().unwrap();
        assert_eq!(config.github.token.as_deref(), Some("ghp_abc"));
        std::env::remove_var("TEST_FM_TOKEN");
    }

    #[test]
    fn test_defaults() {
        let minimal = r#"
[github]
repo = "acme/widget"
token_env = "GH_TOKEN"
"#;
        let config: AppConfig = toml::from_str(minimal).unwrap();
        assert_eq!(config.github.api_url, "https://api.github.com");
        assert_eq!(config.github.trunk_branch, "main");
        assert_eq!(config.mirror.title_prefix, "[mirror]");
        assert_eq!(config.runner.log_level, "info");
    }

    // -------------------------------------------------------------------
    // Git URL derivation
    // -------------------------------------------------------------------

    fn github_config(api_url: &str, git_base_url: Option<&str>, repo: &str) -> GitHubConfig {
        GitHubConfig {
            api_url: api_url.into(),
            repo: repo.into(),
            token_env: "GH_TOKEN".into(),
            trunk_branch: "main".into(),
            git_base_url: git_base_url.map(String::from),
            token: None,
        }
    }

    #[test]
    fn test_git_base_github_com() {
        let cfg = github_config("https://api.github.com", None, "acme/widget");
        assert_eq!(cfg.git_base(), "https://github.com");
        assert_eq!(cfg.upstream_git_url(), "https://github.com/acme/widget.git");
    }

    #[test]
    fn test_git_base_enterprise_api_v3() {
        let cfg = github_config("https://github.company.com/api/v3/", None, "org/repo");
        assert_eq!(cfg.git_base(), "https://github.company.com");
        assert_eq!(
            cfg.upstream_git_url(),
            "https://github.company.com/org/repo.git"
        );
    }

    #[test]
    fn test_git_base_explicit_override() {
        let cfg = github_config(
            "https://api.github.com",
            Some("https://ghes.internal.net/"),
            "team/project",
        );
        assert_eq!(
            cfg.upstream_git_url(),
            "https://ghes.internal.net/team/project.git"
        );
    }

    #[test]
    fn test_git_base_empty_override_falls_through() {
        let cfg = github_config("https://api.github.com", Some("  "), "acme/widget");
        assert_eq!(cfg.git_base(), "https://github.com");
    }
}
