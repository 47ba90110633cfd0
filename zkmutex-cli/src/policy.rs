//! Exit policy controller
//!
//! Decides, from the configured [`ExitPolicy`] alone, what the process does
//! after an election attempt or a job run.

use zkmutex_config::ExitPolicy;

use crate::exit_codes::{EXIT_ERROR, EXIT_SUCCESS};

/// Something that happened to the current lock holder or candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyEvent {
    /// The election attempt ended without the lock
    ElectionFailed,
    /// The job ran while we held the lock and has ended
    JobFinished,
    /// The lock went away while the job was running
    LockLost,
}

/// What the supervisor does next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Start a fresh election
    Reelect,
    /// Stop with this exit code
    Exit(i32),
}

/// Pure mapping from events to decisions for one policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyController {
    policy: ExitPolicy,
}

impl PolicyController {
    pub fn new(policy: ExitPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ExitPolicy {
        self.policy
    }

    /// Next action after `event`
    pub fn decide(&self, event: PolicyEvent) -> Decision {
        match (self.policy, event) {
            (ExitPolicy::ReacquireLock, _) => Decision::Reelect,
            (_, PolicyEvent::ElectionFailed) => Decision::Exit(EXIT_ERROR),
            (ExitPolicy::RunCommand | ExitPolicy::Terminate, _) => Decision::Exit(EXIT_SUCCESS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVENTS: [PolicyEvent; 3] = [
        PolicyEvent::ElectionFailed,
        PolicyEvent::JobFinished,
        PolicyEvent::LockLost,
    ];

    #[test]
    fn test_reacquire_lock_always_reelects() {
        let controller = PolicyController::new(ExitPolicy::ReacquireLock);
        for event in EVENTS {
            assert_eq!(controller.decide(event), Decision::Reelect);
        }
    }

    #[test]
    fn test_run_command_stops_after_one_run() {
        let controller = PolicyController::new(ExitPolicy::RunCommand);
        assert_eq!(
            controller.decide(PolicyEvent::JobFinished),
            Decision::Exit(EXIT_SUCCESS)
        );
        assert_eq!(
            controller.decide(PolicyEvent::LockLost),
            Decision::Exit(EXIT_SUCCESS)
        );
        assert_eq!(
            controller.decide(PolicyEvent::ElectionFailed),
            Decision::Exit(EXIT_ERROR)
        );
    }

    #[test]
    fn test_terminate_never_retries() {
        let controller = PolicyController::new(ExitPolicy::Terminate);
        for event in EVENTS {
            assert!(matches!(controller.decide(event), Decision::Exit(_)));
        }
        assert_eq!(
            controller.decide(PolicyEvent::ElectionFailed),
            Decision::Exit(EXIT_ERROR)
        );
    }

    #[test]
    fn test_decisions_are_deterministic() {
        for policy in [
            ExitPolicy::ReacquireLock,
            ExitPolicy::RunCommand,
            ExitPolicy::Terminate,
        ] {
            let controller = PolicyController::new(policy);
            for event in EVENTS {
                assert_eq!(controller.decide(event), controller.decide(event));
            }
        }
    }
}
