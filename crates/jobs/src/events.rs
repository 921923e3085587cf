//! Events emitted by the lifecycle engine.

use printwatch_core::Job;

/// A change to the job ledger the rest of the system cares about.
///
/// Every variant carries the full job as it looked right after the change
/// was persisted; consumers never read the ledger back.
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    /// A new print was detected and a job allocated for it.
    Created { job: Job },

    /// The current job changed: pause/resume toggle or project attach.
    Updated { job: Job },

    /// The current job reached a terminal state.
    Finished { job: Job },

    /// A comment or recipient edit was applied, possibly to a job from
    /// history.
    Edited { job: Job },
}

impl JobEvent {
    /// The job this event is about.
    pub fn job(&self) -> &Job {
        match self {
            Self::Created { job }
            | Self::Updated { job }
            | Self::Finished { job }
            | Self::Edited { job } => job,
        }
    }
}
