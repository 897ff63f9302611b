//! Pure derivations over the session state.
//!
//! Everything here is recomputed from scratch on each call, independent of any
//! presentation refresh cycle, so a stale memo can never be observed.

use std::cmp::Ordering;

use comms::types::{Task, TaskStatus};

use super::state::SessionState;

/// How far along the vote on the active task is
#[derive(Debug, Clone, PartialEq)]
pub struct VotingProgress {
    pub total_users: usize,
    pub voted_users: usize,
    pub pending_users: usize,
    /// Completed percentage in `[0, 100]`, `0` for an empty room
    pub percentage: f64,
    pub status: Option<TaskStatus>,
}

/// Aggregate statistics over one task's votes
#[derive(Debug, Clone, PartialEq)]
pub struct VoteStatistics {
    pub average: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
    /// How tightly the votes cluster around the average, in `[0, 100]`
    pub consensus: f64,
}

/// Progress of the vote on the active task.
///
/// A stale vote left behind by a departed user is never counted, so the voted
/// count stays attributable to the listed participants.
pub fn voting_progress(state: &SessionState) -> VotingProgress {
    let total_users = state.users.len();
    let (voted_users, status) = match state.active_task() {
        Some(task) => {
            let voted = task
                .votes
                .keys()
                .filter(|user_id| state.users.iter().any(|u| &u.user_id == *user_id))
                .count();

            (voted, Some(task.status))
        }
        None => (0, None),
    };

    let percentage = if total_users > 0 {
        voted_users as f64 / total_users as f64 * 100.0
    } else {
        0.0
    };

    VotingProgress {
        total_users,
        voted_users,
        pending_users: total_users - voted_users,
        percentage,
        status,
    }
}

/// Statistics over a task's vote values. All fields are `0` for an empty vote
/// map, a NaN can never escape this function.
pub fn vote_statistics(task: &Task) -> VoteStatistics {
    let mut values: Vec<f64> = task.votes.values().copied().collect();
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let count = values.len();
    if count == 0 {
        return VoteStatistics {
            average: 0.0,
            median: 0.0,
            min: 0.0,
            max: 0.0,
            count: 0,
            consensus: 0.0,
        };
    }

    let sum: f64 = values.iter().sum();
    let average = sum / count as f64;

    let median = if count % 2 == 1 {
        values[count / 2]
    } else {
        (values[count / 2 - 1] + values[count / 2]) / 2.0
    };

    VoteStatistics {
        average,
        median,
        min: values[0],
        max: values[count - 1],
        count,
        consensus: consensus(&values, average),
    }
}

/// `100 - (stddev / average) * 100`, clamped to `[0, 100]` and defined as `0`
/// when the average is `0` to keep the division total.
fn consensus(values: &[f64], average: f64) -> f64 {
    if values.is_empty() || average == 0.0 {
        return 0.0;
    }

    let variance = values
        .iter()
        .map(|value| (value - average) * (value - average))
        .sum::<f64>()
        / values.len() as f64;
    let stddev = variance.sqrt();

    let score = 100.0 - (stddev / average) * 100.0;
    if score.is_finite() {
        score.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use comms::types::User;

    use super::*;

    fn task_with_votes(votes: &[(&str, f64)]) -> Task {
        let mut task = Task::new("A", "first", 0);
        for (user_id, vote) in votes {
            task.votes.insert(String::from(*user_id), *vote);
        }

        task
    }

    #[test]
    fn test_statistics_for_a_typical_vote() {
        let task = task_with_votes(&[
            ("u1", 1.0),
            ("u2", 2.0),
            ("u3", 3.0),
            ("u4", 5.0),
            ("u5", 8.0),
        ]);

        let stats = vote_statistics(&task);

        assert_eq!(stats.average, 3.8);
        assert_eq!(stats.median, 3.0);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 8.0);
        assert_eq!(stats.count, 5);
        assert!(stats.consensus > 0.0 && stats.consensus < 100.0);
    }

    #[test]
    fn test_statistics_median_of_even_vote_count() {
        let task = task_with_votes(&[("u1", 2.0), ("u2", 3.0), ("u3", 5.0), ("u4", 8.0)]);

        assert_eq!(vote_statistics(&task).median, 4.0);
    }

    #[test]
    fn test_statistics_of_empty_vote_map_are_all_zero() {
        let stats = vote_statistics(&Task::new("A", "first", 0));

        assert_eq!(stats.average, 0.0);
        assert_eq!(stats.median, 0.0);
        assert_eq!(stats.min, 0.0);
        assert_eq!(stats.max, 0.0);
        assert_eq!(stats.count, 0);
        assert_eq!(stats.consensus, 0.0);
    }

    #[test]
    fn test_unanimous_votes_have_full_consensus() {
        let task = task_with_votes(&[("u1", 5.0), ("u2", 5.0), ("u3", 5.0)]);

        assert_eq!(vote_statistics(&task).consensus, 100.0);
    }

    #[test]
    fn test_zero_average_votes_coerce_consensus_to_zero() {
        let task = task_with_votes(&[("u1", 0.0), ("u2", 0.0)]);

        let stats = vote_statistics(&task);
        assert_eq!(stats.average, 0.0);
        assert_eq!(stats.consensus, 0.0);
    }

    #[test]
    fn test_progress_over_the_active_task() {
        let mut state = SessionState::default();
        state.create_room("R1", User::new("u1", "alice"), vec![Task::new("A", "a", 0)]);
        state.add_user(User::new("u2", "bob"));
        state.set_active_task(Some("A".to_string()));
        state.register_vote("A", "u1", Some(5.0));

        let progress = voting_progress(&state);

        assert_eq!(progress.total_users, 2);
        assert_eq!(progress.voted_users, 1);
        assert_eq!(progress.pending_users, 1);
        assert_eq!(progress.percentage, 50.0);
        assert_eq!(progress.status, Some(TaskStatus::NotStarted));
    }

    #[test]
    fn test_progress_ignores_votes_of_departed_users() {
        let mut state = SessionState::default();
        state.create_room("R1", User::new("u1", "alice"), vec![Task::new("A", "a", 0)]);
        state.set_active_task(Some("A".to_string()));
        // the vote map still carries an entry from a user no longer listed
        state.register_vote("A", "u1", Some(5.0));
        state.register_vote("A", "ghost", Some(3.0));
        state.replace_user_list(vec![User::new("u1", "alice")]);

        let progress = voting_progress(&state);

        assert_eq!(progress.total_users, 1);
        assert_eq!(progress.voted_users, 1);
        assert_eq!(progress.percentage, 100.0);
    }

    #[test]
    fn test_progress_without_an_active_task() {
        let state = SessionState::default();

        let progress = voting_progress(&state);

        assert_eq!(progress.total_users, 0);
        assert_eq!(progress.voted_users, 0);
        assert_eq!(progress.percentage, 0.0);
        assert_eq!(progress.status, None);
    }
}
