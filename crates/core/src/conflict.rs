//! Branch-name conflict detection.
//!
//! A fork branch is mirrored upstream under its own name verbatim, so an
//! upstream branch of the same name makes mirroring unsafe on a first-time
//! mirror. On updates the mirror branch's own existence is expected.

use tracing::{debug, info};

use crate::errors::MirrorError;
use crate::event::EventAction;
use crate::git::GitClient;

/// Result of the conflict check.
#[derive(Debug, Clone, Copy)]
pub struct ConflictCheck {
    pub conflict: bool,
}

/// Stateless detector deciding whether mirroring may proceed.
pub struct ConflictDetector;

impl ConflictDetector {
    /// Pure decision: a conflict exists only when a first-time mirror
    /// (`opened`) targets a branch name already present upstream.
    pub fn evaluate(action: EventAction, branch_exists: bool) -> bool {
        matches!(action, EventAction::Opened) && branch_exists
    }

    /// Check the upstream remote for a colliding branch.
    ///
    /// The `synchronize` path never lists remote refs -- the mirror branch
    /// existing upstream is the expected state, not a collision.
    pub fn check(
        git: &GitClient,
        upstream_url: &str,
        token: Option<&str>,
        action: EventAction,
        branch: &str,
    ) -> Result<ConflictCheck, MirrorError> {
        let branch_exists = match action {
            EventAction::Synchronize => {
                debug!(branch, "synchronize event, skipping collision check");
                false
            }
            EventAction::Opened => git.remote_branch_exists(upstream_url, branch, token)?,
        };

        let conflict = Self::evaluate(action, branch_exists);
        if conflict {
            info!(branch, "upstream branch name collision detected");
        }
        Ok(ConflictCheck { conflict })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opened_with_existing_branch_conflicts() {
        assert!(ConflictDetector::evaluate(EventAction::Opened, true));
    }

    #[test]
    fn test_opened_with_fresh_branch_is_clear() {
        assert!(!ConflictDetector::evaluate(EventAction::Opened, false));
    }

    #[test]
    fn test_synchronize_never_conflicts() {
        assert!(!ConflictDetector::evaluate(EventAction::Synchronize, true));
        assert!(!ConflictDetector::evaluate(EventAction::Synchronize, false));
    }
}
