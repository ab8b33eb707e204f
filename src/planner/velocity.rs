//! Velocity derivation from sprint history

use crate::domain::{Sprint, SprintStatus};

/// Derive a sprint's velocity from recent throughput: the mean completed
/// points of the last `lookback` completed sprints, rounded to nearest.
/// Falls back to `default_velocity` when no history exists.
pub fn derive_velocity(history: &[Sprint], lookback: usize, default_velocity: u32) -> u32 {
    let mut completed: Vec<&Sprint> = history
        .iter()
        .filter(|s| s.status == SprintStatus::Completed)
        .collect();
    completed.sort_by_key(|s| std::cmp::Reverse(s.ended_at.unwrap_or(0)));
    completed.truncate(lookback);

    if completed.is_empty() {
        return default_velocity;
    }

    let total: u32 = completed.iter().map(|s| s.completed_points).sum();
    let count = completed.len() as u32;
    (total + count / 2) / count
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed_sprint(name: &str, points: u32, ended_at: i64) -> Sprint {
        let mut sprint = Sprint::new(name, "", 20);
        sprint.status = SprintStatus::Completed;
        sprint.completed_points = points;
        sprint.ended_at = Some(ended_at);
        sprint
    }

    #[test]
    fn test_default_when_no_history() {
        assert_eq!(derive_velocity(&[], 3, 20), 20);

        // Cancelled or planning sprints do not count as history
        let mut cancelled = Sprint::new("s", "", 20);
        cancelled.status = SprintStatus::Cancelled;
        assert_eq!(derive_velocity(&[cancelled], 3, 20), 20);
    }

    #[test]
    fn test_mean_of_completed() {
        let history = vec![
            completed_sprint("s1", 18, 1),
            completed_sprint("s2", 22, 2),
            completed_sprint("s3", 20, 3),
        ];
        assert_eq!(derive_velocity(&history, 3, 20), 20);
    }

    #[test]
    fn test_only_most_recent_lookback_counts() {
        let history = vec![
            completed_sprint("old", 100, 1),
            completed_sprint("s1", 10, 2),
            completed_sprint("s2", 10, 3),
            completed_sprint("s3", 10, 4),
        ];
        // The 100-point outlier is outside the 3-sprint window
        assert_eq!(derive_velocity(&history, 3, 20), 10);
    }

    #[test]
    fn test_rounding() {
        let history = vec![completed_sprint("s1", 10, 1), completed_sprint("s2", 11, 2)];
        // mean 10.5 rounds to 11
        assert_eq!(derive_velocity(&history, 3, 20), 11);
    }
}
