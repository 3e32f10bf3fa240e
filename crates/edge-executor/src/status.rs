//! The accumulated cache status trace.

/// Labels describing what happened to a request, in order.
///
/// Rendered as the `x-HTML-Edge-Cache-Status` value, e.g. `Miss, Cached`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusTrace {
    labels: Vec<String>,
}

impl StatusTrace {
    pub const HIT: &'static str = "Hit";
    pub const MISS: &'static str = "Miss";
    pub const BYPASS_COOKIE: &'static str = "Bypass Cookie";
    pub const BYPASS_RELOAD: &'static str = "Bypass for Reload";
    pub const PURGED: &'static str = "Purged";
    pub const CACHED: &'static str = "Cached";

    /// Start a trace with one label.
    pub fn new(first: impl Into<String>) -> Self {
        Self {
            labels: vec![first.into()],
        }
    }

    /// Append a label.
    pub fn push(&mut self, label: impl Into<String>) {
        self.labels.push(label.into());
    }

    /// Record a failed cache read.
    pub fn read_exception(message: &str) -> Self {
        Self::new(format!("Cache Read Exception: {}", message))
    }

    /// Whether a label is present.
    pub fn contains(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// The labels in order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

impl std::fmt::Display for StatusTrace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.labels.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_joined_labels() {
        let mut trace = StatusTrace::new(StatusTrace::MISS);
        trace.push(StatusTrace::PURGED);
        trace.push(StatusTrace::CACHED);
        assert_eq!(trace.to_string(), "Miss, Purged, Cached");
        assert!(trace.contains("Purged"));
    }

    #[test]
    fn test_read_exception() {
        let trace = StatusTrace::read_exception("store read failed: timeout");
        assert_eq!(
            trace.to_string(),
            "Cache Read Exception: store read failed: timeout"
        );
    }
}
