//! Heat scoring: pure transforms over the matchup-win tally.

use crate::types::{Player, PlayerId};
use std::collections::HashMap;

/// Points added to each heat winner's score on top of their raw
/// matchup-win credits.
pub const HEAT_WIN_BONUS: u32 = 3;

/// Credit the outcome of one matchup into the heat tally. A strict
/// majority credits the winner; an exact tie (including zero votes)
/// credits both contestants.
pub fn record_matchup_result(
    wins: &mut HashMap<PlayerId, u32>,
    left: &PlayerId,
    right: &PlayerId,
    left_votes: u32,
    right_votes: u32,
) {
    if left_votes > right_votes {
        *wins.entry(left.clone()).or_insert(0) += 1;
    } else if right_votes > left_votes {
        *wins.entry(right.clone()).or_insert(0) += 1;
    } else {
        *wins.entry(left.clone()).or_insert(0) += 1;
        *wins.entry(right.clone()).or_insert(0) += 1;
    }
}

/// Everyone holding the maximum tally; ties credit all co-maximal
/// participants.
pub fn heat_winners(wins: &HashMap<PlayerId, u32>) -> Vec<PlayerId> {
    let max = wins.values().copied().max().unwrap_or(0);
    let mut winners: Vec<PlayerId> = wins
        .iter()
        .filter(|(_, &w)| w == max)
        .map(|(id, _)| id.clone())
        .collect();
    winners.sort();
    winners
}

/// Fold a finished heat into the roster's scores: every participant keeps
/// their raw matchup-win credits and each heat winner gets the bonus.
pub fn apply_heat_scores(players: &[Player], wins: &HashMap<PlayerId, u32>) -> Vec<Player> {
    let winners = heat_winners(wins);
    players
        .iter()
        .map(|p| {
            let credits = wins.get(&p.id).copied().unwrap_or(0);
            let bonus = if winners.contains(&p.id) {
                HEAT_WIN_BONUS
            } else {
                0
            };
            Player {
                id: p.id.clone(),
                nickname: p.nickname.clone(),
                score: p.score + credits + bonus,
            }
        })
        .collect()
}

/// Two-player games (or heats with no eligible voters) skip voting:
/// every eligible submitter is a tied heat winner worth a flat point.
pub fn award_uncontested_heat(players: &[Player], eligible: &[PlayerId]) -> Vec<Player> {
    players
        .iter()
        .map(|p| Player {
            id: p.id.clone(),
            nickname: p.nickname.clone(),
            score: p.score + u32::from(eligible.contains(&p.id)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn players(ids: &[&str]) -> Vec<Player> {
        ids.iter()
            .map(|id| Player {
                id: id.to_string(),
                nickname: id.to_uppercase(),
                score: 0,
            })
            .collect()
    }

    #[test]
    fn majority_wins_tie_credits_both() {
        let mut wins = HashMap::new();
        record_matchup_result(&mut wins, &"a".into(), &"b".into(), 3, 1);
        assert_eq!(wins.get("a"), Some(&1));
        assert_eq!(wins.get("b"), None);

        record_matchup_result(&mut wins, &"c".into(), &"d".into(), 2, 2);
        assert_eq!(wins.get("c"), Some(&1));
        assert_eq!(wins.get("d"), Some(&1));
    }

    #[test]
    fn credits_sum_to_matchups_plus_ties() {
        // 3 matchups, one of them tied: 2 + 2*1 = 4 credits total
        let mut wins = HashMap::new();
        record_matchup_result(&mut wins, &"a".into(), &"b".into(), 2, 0);
        record_matchup_result(&mut wins, &"c".into(), &"d".into(), 0, 1);
        record_matchup_result(&mut wins, &"e".into(), &"f".into(), 1, 1);
        let total: u32 = wins.values().sum();
        assert_eq!(total, 4);
    }

    #[test]
    fn four_player_unanimous_scenario() {
        // 4 players, R=1, M=4: one heat, two matchups. Unanimous votes for
        // a and c. Winners score 1 + 3 = 4, losers 0.
        let roster = players(&["a", "b", "c", "d"]);
        let mut wins = HashMap::new();
        record_matchup_result(&mut wins, &"a".into(), &"b".into(), 2, 0);
        record_matchup_result(&mut wins, &"c".into(), &"d".into(), 2, 0);

        let winners = heat_winners(&wins);
        assert_eq!(winners, vec!["a".to_string(), "c".to_string()]);

        let scored = apply_heat_scores(&roster, &wins);
        let score_of = |id: &str| scored.iter().find(|p| p.id == id).unwrap().score;
        assert_eq!(score_of("a"), 4);
        assert_eq!(score_of("c"), 4);
        assert_eq!(score_of("b"), 0);
        assert_eq!(score_of("d"), 0);
    }

    #[test]
    fn all_tied_heat_credits_everyone() {
        let roster = players(&["a", "b"]);
        let mut wins = HashMap::new();
        record_matchup_result(&mut wins, &"a".into(), &"b".into(), 0, 0);
        let scored = apply_heat_scores(&roster, &wins);
        // both tied at 1 credit, both heat winners: 1 + 3 each
        assert!(scored.iter().all(|p| p.score == 4));
    }

    #[test]
    fn uncontested_heat_awards_flat_point() {
        let roster = players(&["a", "b"]);
        let scored = award_uncontested_heat(&roster, &["a".to_string(), "b".to_string()]);
        assert!(scored.iter().all(|p| p.score == 1));

        let partial = award_uncontested_heat(&roster, &["a".to_string()]);
        assert_eq!(partial[0].score, 1);
        assert_eq!(partial[1].score, 0);
    }

    #[test]
    fn scores_never_decrease() {
        let mut roster = players(&["a", "b"]);
        roster[0].score = 7;
        let wins = HashMap::new();
        let scored = apply_heat_scores(&roster, &wins);
        assert_eq!(scored[0].score, 7);
        assert_eq!(scored[1].score, 0);
    }
}
