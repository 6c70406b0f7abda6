//! crates/vital_core/src/report.rs
//!
//! The report data aggregator: derives per-user breathing statistics from a
//! sequence of session logs. Pure and order-independent; the store happens to
//! return sessions sorted by timestamp, but nothing here relies on it.

use crate::domain::{BreathingSession, DerivedStats};

/// Computes `DerivedStats` over a possibly-empty sequence of sessions.
///
/// Missing durations count as 0. An empty sequence yields all-zero stats
/// rather than an error; the renderer decides how to present that.
pub fn aggregate(sessions: &[BreathingSession]) -> DerivedStats {
    let mut stats = DerivedStats::default();
    for session in sessions {
        let duration = session.duration.unwrap_or(0.0);
        stats.total_duration += duration;
        if duration > stats.best_session {
            stats.best_session = duration;
        }
    }
    stats.session_count = sessions.len();
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(duration: Option<f64>) -> BreathingSession {
        BreathingSession {
            id: None,
            uid: "u1".to_string(),
            duration,
            timestamp: None,
        }
    }

    #[test]
    fn empty_sequence_yields_zeroes() {
        let stats = aggregate(&[]);
        assert_eq!(stats, DerivedStats::default());
        assert_eq!(stats.session_count, 0);
        assert_eq!(stats.best_session, 0.0);
    }

    #[test]
    fn sums_counts_and_takes_the_max() {
        let stats = aggregate(&[session(Some(5.0)), session(Some(9.0))]);
        assert_eq!(stats.total_duration, 14.0);
        assert_eq!(stats.session_count, 2);
        assert_eq!(stats.best_session, 9.0);
    }

    #[test]
    fn invariant_under_reordering() {
        let forward = aggregate(&[session(Some(5.0)), session(Some(9.0)), session(Some(2.0))]);
        let reversed = aggregate(&[session(Some(2.0)), session(Some(9.0)), session(Some(5.0))]);
        assert_eq!(forward, reversed);
    }

    #[test]
    fn missing_durations_count_as_zero() {
        let stats = aggregate(&[session(None), session(Some(3.0)), session(None)]);
        assert_eq!(stats.total_duration, 3.0);
        assert_eq!(stats.session_count, 3);
        assert_eq!(stats.best_session, 3.0);
    }
}
