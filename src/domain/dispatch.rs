use {
    super::error::ReconError,
    super::event::IncomingEvent,
    serde::{Deserialize, Serialize},
    std::fmt,
    uuid::Uuid,
};

/// Which processing entry point a deferred job re-enters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookName {
    ProcessTransaction,
    SaveCard,
}

impl HookName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProcessTransaction => "process_transaction",
            Self::SaveCard => "save_card",
        }
    }
}

impl fmt::Display for HookName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A claimed deferred task, carrying the trusted event it was scheduled with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeferredJob {
    pub id: Uuid,
    pub hook: HookName,
    pub event: IncomingEvent,
}

/// Run-later-once task queue. Scheduling failures surface as
/// `"Failed to schedule action."`; execution is the worker's concern.
pub trait DeferredDispatch: Send + Sync {
    fn schedule(&self, hook: HookName, event: IncomingEvent) -> Result<(), ReconError>;

    /// Claim jobs whose delay has elapsed. A claimed job is gone from the
    /// queue; the worker decides what a failure means.
    fn claim_due(&self, limit: usize) -> Result<Vec<DeferredJob>, ReconError>;
}
