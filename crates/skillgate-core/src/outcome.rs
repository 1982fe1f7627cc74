//! Derivation of the single success-or-failure verdict of an agent run.

use crate::message::{ResultMessage, UpstreamMessage, Usage};

/// Error reported when a run ends without any usable result.
pub const UNKNOWN_ERROR: &str = "Unknown error occurred";

/// Final verdict of an agent run.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayOutcome {
    Success {
        response: String,
        usage: Option<Usage>,
        cost_usd: Option<f64>,
    },
    Failure {
        errors: Vec<String>,
    },
}

impl RelayOutcome {
    /// Builds the outcome from the last `result` message seen, if any.
    pub fn from_result(result: Option<&ResultMessage>) -> Self {
        match result {
            Some(r) if r.is_success() => Self::Success {
                response: r.result.clone().unwrap_or_default(),
                usage: r.usage.clone(),
                cost_usd: r.total_cost_usd,
            },
            Some(r) if !r.errors.is_empty() => Self::Failure { errors: r.errors.clone() },
            _ => Self::unknown_failure(),
        }
    }

    /// Scans a complete message sequence; the last `result` wins.
    pub fn from_messages<'a, I>(messages: I) -> Self
    where
        I: IntoIterator<Item = &'a UpstreamMessage>,
    {
        let mut tracker = OutcomeTracker::default();
        for msg in messages {
            tracker.observe(msg);
        }
        tracker.finish()
    }

    pub fn unknown_failure() -> Self {
        Self::Failure { errors: vec![UNKNOWN_ERROR.to_string()] }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Incrementally tracks the latest `result` message of a running sequence.
#[derive(Debug, Default)]
pub struct OutcomeTracker {
    latest: Option<ResultMessage>,
    results_seen: usize,
}

impl OutcomeTracker {
    pub fn observe(&mut self, msg: &UpstreamMessage) {
        if let Some(result) = msg.as_result() {
            self.latest = Some(result.clone());
            self.results_seen += 1;
        }
    }

    /// Number of `result` messages observed so far.
    pub fn results_seen(&self) -> usize {
        self.results_seen
    }

    pub fn finish(self) -> RelayOutcome {
        RelayOutcome::from_result(self.latest.as_ref())
    }
}
