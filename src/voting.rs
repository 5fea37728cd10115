//! Map-vote windowing: which votes are upcoming, active or completed at a
//! given instant, and which option won.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{MapVote, MapVoteSummary, OptionTally, VoteStatus};

impl VoteStatus {
    /// Status of a `[start, end)` window at `now`.
    pub fn at(start: DateTime<Utc>, end: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        if now < start {
            VoteStatus::Upcoming
        } else if now < end {
            VoteStatus::Active
        } else {
            VoteStatus::Completed
        }
    }
}

impl MapVote {
    pub fn status_at(&self, now: DateTime<Utc>) -> VoteStatus {
        VoteStatus::at(self.start_time, self.end_time, now)
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status_at(now) == VoteStatus::Active
    }
}

/// winning_option
///
/// The option with the most votes. Ties go to the lowest `position`. Returns
/// `None` when no ballots were cast.
pub fn winning_option(tallies: &[OptionTally]) -> Option<&OptionTally> {
    tallies
        .iter()
        .filter(|t| t.votes > 0)
        .max_by(|a, b| a.votes.cmp(&b.votes).then(b.position.cmp(&a.position)))
}

/// Builds the UI view of one vote. `tallies` may contain options of other votes;
/// only this vote's options are kept, ordered by position.
pub fn summarize(
    vote: &MapVote,
    tallies: &[OptionTally],
    user_choice: Option<Uuid>,
    now: DateTime<Utc>,
) -> MapVoteSummary {
    let mut options: Vec<OptionTally> = tallies
        .iter()
        .filter(|t| t.map_vote_id == vote.id)
        .cloned()
        .collect();
    options.sort_by_key(|t| t.position);

    let status = vote.status_at(now);
    let total_votes = options.iter().map(|t| t.votes).sum();
    let winning_option_id = match status {
        VoteStatus::Completed => winning_option(&options).map(|t| t.option_id),
        _ => None,
    };

    MapVoteSummary {
        id: vote.id,
        server_id: vote.server_id,
        title: vote.title.clone(),
        description: vote.description.clone(),
        start_time: vote.start_time,
        end_time: vote.end_time,
        status,
        options,
        total_votes,
        winning_option_id,
        user_choice,
    }
}

/// Summaries for many votes at once, optionally restricted to one status.
pub fn summarize_all(
    votes: &[MapVote],
    tallies: &[OptionTally],
    choices: &[(Uuid, Uuid)],
    status: Option<VoteStatus>,
    now: DateTime<Utc>,
) -> Vec<MapVoteSummary> {
    votes
        .iter()
        .filter(|v| status.is_none_or(|s| v.status_at(now) == s))
        .map(|v| {
            let choice = choices
                .iter()
                .find(|(vote_id, _)| *vote_id == v.id)
                .map(|(_, option_id)| *option_id);
            summarize(v, tallies, choice, now)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn vote(start: DateTime<Utc>, end: DateTime<Utc>) -> MapVote {
        MapVote {
            id: Uuid::new_v4(),
            title: "Next map".to_string(),
            start_time: start,
            end_time: end,
            ..MapVote::default()
        }
    }

    fn tally(vote_id: Uuid, position: i32, votes: i64) -> OptionTally {
        OptionTally {
            option_id: Uuid::new_v4(),
            map_vote_id: vote_id,
            map_name: format!("map_{position}"),
            image_key: None,
            position,
            votes,
        }
    }

    #[test]
    fn window_boundaries() {
        let now = Utc::now();
        let start = now;
        let end = now + Duration::hours(1);
        assert_eq!(
            VoteStatus::at(start, end, now - Duration::seconds(1)),
            VoteStatus::Upcoming
        );
        assert_eq!(VoteStatus::at(start, end, start), VoteStatus::Active);
        assert_eq!(
            VoteStatus::at(start, end, end - Duration::seconds(1)),
            VoteStatus::Active
        );
        assert_eq!(VoteStatus::at(start, end, end), VoteStatus::Completed);
    }

    #[test]
    fn winner_has_most_votes() {
        let id = Uuid::new_v4();
        let tallies = vec![tally(id, 0, 2), tally(id, 1, 5), tally(id, 2, 3)];
        assert_eq!(winning_option(&tallies).map(|t| t.position), Some(1));
    }

    #[test]
    fn ties_go_to_lowest_position() {
        let id = Uuid::new_v4();
        let tallies = vec![tally(id, 2, 4), tally(id, 0, 1), tally(id, 1, 4)];
        assert_eq!(winning_option(&tallies).map(|t| t.position), Some(1));
    }

    #[test]
    fn no_winner_without_ballots() {
        let id = Uuid::new_v4();
        let tallies = vec![tally(id, 0, 0), tally(id, 1, 0)];
        assert!(winning_option(&tallies).is_none());
        assert!(winning_option(&[]).is_none());
    }

    #[test]
    fn winner_only_reported_once_completed() {
        let now = Utc::now();
        let active = vote(now - Duration::hours(1), now + Duration::hours(1));
        let done = vote(now - Duration::hours(2), now - Duration::hours(1));
        let tallies = vec![
            tally(active.id, 0, 3),
            tally(active.id, 1, 1),
            tally(done.id, 1, 1),
            tally(done.id, 0, 7),
        ];

        let a = summarize(&active, &tallies, None, now);
        assert_eq!(a.status, VoteStatus::Active);
        assert_eq!(a.total_votes, 4);
        assert!(a.winning_option_id.is_none());

        let d = summarize(&done, &tallies, None, now);
        assert_eq!(d.status, VoteStatus::Completed);
        assert_eq!(d.options.len(), 2);
        assert_eq!(d.options[0].position, 0);
        assert_eq!(d.winning_option_id, Some(d.options[0].option_id));
    }

    #[test]
    fn summarize_all_filters_by_status_and_attaches_choice() {
        let now = Utc::now();
        let upcoming = vote(now + Duration::hours(1), now + Duration::hours(2));
        let active = vote(now - Duration::hours(1), now + Duration::hours(1));
        let tallies = vec![tally(active.id, 0, 1), tally(upcoming.id, 0, 0)];
        let choice = tallies[0].option_id;
        let votes = vec![upcoming.clone(), active.clone()];

        let all = summarize_all(&votes, &tallies, &[(active.id, choice)], None, now);
        assert_eq!(all.len(), 2);

        let only_active = summarize_all(
            &votes,
            &tallies,
            &[(active.id, choice)],
            Some(VoteStatus::Active),
            now,
        );
        assert_eq!(only_active.len(), 1);
        assert_eq!(only_active[0].id, active.id);
        assert_eq!(only_active[0].user_choice, Some(choice));
    }
}
