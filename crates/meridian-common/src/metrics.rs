//! Injected metrics capability.
//!
//! Metrics are a collaborator, not a process-wide singleton: callers pass a
//! `&dyn Metrics` into the apply paths and the implementation decides where
//! counters go.

/// Counter-naming metrics sink.
///
/// Names are hierarchical, e.g. `["op-merge", "failure", "no-account"]`.
pub trait Metrics: Send + Sync {
    /// Mark one occurrence of the named counter.
    fn mark(&self, name: &[&str]);
}

/// Metrics sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl Metrics for NoopMetrics {
    fn mark(&self, _name: &[&str]) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recording(Mutex<Vec<String>>);

    impl Metrics for Recording {
        fn mark(&self, name: &[&str]) {
            self.0.lock().unwrap().push(name.join("."));
        }
    }

    #[test]
    fn test_recording_sink() {
        let sink = Recording(Mutex::new(Vec::new()));
        sink.mark(&["ledger", "account", "add"]);
        assert_eq!(sink.0.lock().unwrap().as_slice(), &["ledger.account.add"]);
    }
}
