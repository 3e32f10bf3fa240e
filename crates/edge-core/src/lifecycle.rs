//! Request lifecycle tracking.

use std::time::Duration;

/// Lifecycle phases of a request routed through the edge cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    /// Request received, eligibility not yet decided.
    Start,
    /// Probing the edge store under the current generation.
    Lookup,
    /// A stored entry was found and may be served.
    Hit,
    /// Nothing servable was stored; going to origin.
    Miss,
    /// The cache was skipped for this client or request.
    Bypass,
    /// Final response is being annotated and returned.
    Respond,
}

impl LifecyclePhase {
    /// Short lowercase name, used as a log field.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Lookup => "lookup",
            Self::Hit => "hit",
            Self::Miss => "miss",
            Self::Bypass => "bypass",
            Self::Respond => "respond",
        }
    }
}

impl std::fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Observer trait for lifecycle events.
pub trait LifecycleObserver: Send + Sync {
    /// Called when a request enters a new phase.
    fn on_phase(&self, phase: LifecyclePhase, elapsed: Duration);
}
