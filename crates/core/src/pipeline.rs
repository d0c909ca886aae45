//! The mirror synchronization pipeline.
//!
//! One [`MirrorPipeline::run`] call processes a single fork-PR event
//! end-to-end through strictly ordered stages:
//!
//! 1. Branch-name conflict check against the trusted upstream.
//! 2. Sync validation (fork branch must descend from trunk's tip).
//! 3. Create-or-update branch push.
//! 4. Mirror PR creation (opened) or lookup-and-annotate (synchronize).
//! 5. Status comment back to the fork PR -- on every exit path.
//!
//! Stage results are immutable values threaded forward; a failing stage
//! short-circuits everything after it. There is no retry and no shared state
//! between pipeline instances: concurrent events for different PRs run
//! independently, and all state is reconstructed from the remote each run.

use tracing::{error, info};

use crate::config::AppConfig;
use crate::conflict::ConflictDetector;
use crate::errors::{ConfigError, MirrorError};
use crate::event::{EventAction, ForkPrEvent};
use crate::git::{GitClient, GitHubClient};
use crate::mirror::MirrorSynchronizer;
use crate::notify::{self, Notifier};
use crate::pr_manager::MirrorPrManager;
use crate::sync_check::SyncValidator;

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Terminal classification of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Branch-name collision; nothing was fetched or pushed.
    Conflict,
    /// Fork base is stale; nothing was pushed.
    Unsynced,
    /// Branch mirrored and mirror PR created or annotated.
    Mirrored {
        first_mirror: bool,
        mirror_pr: u64,
    },
    /// Branch mirrored, but no open mirror PR exists to annotate.
    MirrorPrMissing,
}

impl std::fmt::Display for PipelineOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Conflict => write!(f, "conflict"),
            Self::Unsynced => write!(f, "unsynced"),
            Self::Mirrored {
                first_mirror: true, ..
            } => write!(f, "mirrored (first)"),
            Self::Mirrored {
                first_mirror: false,
                ..
            } => write!(f, "mirrored (update)"),
            Self::MirrorPrMissing => write!(f, "mirror PR missing"),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// The per-event mirror pipeline.
pub struct MirrorPipeline {
    config: AppConfig,
    git: GitClient,
    pr_manager: MirrorPrManager,
    notifier: Notifier,
}

impl MirrorPipeline {
    /// Wire up the pipeline from resolved configuration and a scratch git
    /// workspace. Requires the GitHub token to be resolved.
    pub fn new(config: AppConfig, git: GitClient) -> Result<Self, ConfigError> {
        let token = config
            .github
            .token
            .clone()
            .ok_or_else(|| ConfigError::EnvVarMissing {
                var: config.github.token_env.clone(),
                field: "github.token_env".into(),
            })?;
        let github = GitHubClient::new(&config.github.api_url, token);
        let pr_manager = MirrorPrManager::new(github.clone(), &config.github, &config.mirror);
        let notifier = Notifier::new(github, config.github.repo.clone());
        Ok(Self {
            config,
            git,
            pr_manager,
            notifier,
        })
    }

    /// Process one fork-PR event to completion.
    ///
    /// User-actionable stops (conflict, unsynced, missing mirror PR) are
    /// `Ok` outcomes; transport failures are `Err` after being echoed to the
    /// fork PR best-effort.
    pub async fn run(&self, event: &ForkPrEvent) -> Result<PipelineOutcome, MirrorError> {
        let upstream_url = self.config.github.upstream_git_url();
        let token = self.config.github.token.as_deref();

        info!(
            action = %event.action,
            fork_pr = event.pr_number,
            branch = %event.head_branch,
            head_sha = %event.head_sha,
            "processing fork PR event"
        );

        // Stage 1: branch-name conflict check.
        let check = match ConflictDetector::check(
            &self.git,
            &upstream_url,
            token,
            event.action,
            &event.head_branch,
        ) {
            Ok(check) => check,
            Err(e) => return self.fail(event, e).await,
        };
        if check.conflict {
            self.notifier
                .post(
                    event.pr_number,
                    &notify::conflict_message(&event.head_branch),
                )
                .await;
            return Ok(PipelineOutcome::Conflict);
        }

        // Stage 2: the fork branch must descend from trunk's current tip.
        let sync = match SyncValidator::check(
            &self.git,
            &upstream_url,
            &self.config.github.trunk_branch,
            &event.head_clone_url,
            &event.head_branch,
            token,
        ) {
            Ok(sync) => sync,
            Err(e) => return self.fail(event, e).await,
        };
        if !sync.is_synced {
            self.notifier
                .post(
                    event.pr_number,
                    &notify::unsynced_message(&self.config.github.trunk_branch),
                )
                .await;
            return Ok(PipelineOutcome::Unsynced);
        }

        // Stage 3: create-or-update branch push.
        let outcome = match MirrorSynchronizer::sync(
            &self.git,
            &upstream_url,
            &event.head_clone_url,
            &event.head_branch,
            token,
        ) {
            Ok(outcome) => outcome,
            Err(e) => return self.fail(event, e).await,
        };

        // Stage 4: mirror PR lifecycle, keyed by event action -- the mirror
        // PR is first created on `opened` and reused on `synchronize`.
        match event.action {
            EventAction::Opened => match self.pr_manager.create_mirror_pr(event, &outcome).await {
                Ok(pr) => {
                    self.notifier
                        .post(
                            event.pr_number,
                            &notify::mirrored_message(&pr, &outcome.commit_sha),
                        )
                        .await;
                    Ok(PipelineOutcome::Mirrored {
                        first_mirror: outcome.is_first_mirror,
                        mirror_pr: pr.number,
                    })
                }
                Err(e) => self.fail(event, e).await,
            },
            EventAction::Synchronize => {
                match self.pr_manager.update_mirror_pr(event, &outcome).await {
                    Ok(pr) => {
                        self.notifier
                            .post(
                                event.pr_number,
                                &notify::updated_message(&pr, &outcome.commit_sha),
                            )
                            .await;
                        Ok(PipelineOutcome::Mirrored {
                            first_mirror: outcome.is_first_mirror,
                            mirror_pr: pr.number,
                        })
                    }
                    Err(MirrorError::MirrorPrMissing(branch)) => {
                        self.notifier
                            .post(event.pr_number, &notify::mirror_missing_message(&branch))
                            .await;
                        Ok(PipelineOutcome::MirrorPrMissing)
                    }
                    Err(e) => self.fail(event, e).await,
                }
            }
        }
    }

    /// Echo a hard failure to the fork PR (best-effort) and propagate it.
    async fn fail(
        &self,
        event: &ForkPrEvent,
        err: MirrorError,
    ) -> Result<PipelineOutcome, MirrorError> {
        error!(
            fork_pr = event.pr_number,
            branch = %event.head_branch,
            error = %err,
            "mirror pipeline failed"
        );
        self.notifier
            .post(event.pr_number, &notify::failure_message(&err.to_string()))
            .await;
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_display() {
        assert_eq!(PipelineOutcome::Conflict.to_string(), "conflict");
        assert_eq!(PipelineOutcome::Unsynced.to_string(), "unsynced");
        assert_eq!(
            PipelineOutcome::Mirrored {
                first_mirror: true,
                mirror_pr: 42
            }
            .to_string(),
            "mirrored (first)"
        );
        assert_eq!(
            PipelineOutcome::Mirrored {
                first_mirror: false,
                mirror_pr: 42
            }
            .to_string(),
            "mirrored (update)"
        );
        assert_eq!(
            PipelineOutcome::MirrorPrMissing.to_string(),
            "mirror PR missing"
        );
    }
}
