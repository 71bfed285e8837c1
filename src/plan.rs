//! Bracket planner: turns a roster into a cross-round heat plan.

use crate::types::{Heat, PlayerId};
use rand::seq::SliceRandom;
use rand::Rng;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("not enough players to build matchups")]
    NotEnoughPlayers,
}

/// Largest even group size usable with this roster, capped at
/// `max_competitors`.
pub fn eligible_competitors(player_count: usize, max_competitors: usize) -> usize {
    let capped = player_count.min(max_competitors);
    if capped % 2 == 0 {
        capped
    } else {
        capped - 1
    }
}

/// Build the full game's heat plan: for every cycle, shuffle the roster,
/// slice it into groups of the capped size, drop the trailing member of any
/// odd group, and discard groups that end up smaller than two. Which player
/// sits a heat out is decided by that cycle's shuffle, not by position in
/// the roster.
///
/// Every emitted heat has an even participant count between 2 and
/// `max_competitors`. An empty plan means the game cannot start.
pub fn build_round_plan(
    player_ids: &[PlayerId],
    rounds: u32,
    max_competitors: usize,
    rng: &mut impl Rng,
) -> Result<Vec<Heat>, PlanError> {
    let cap = eligible_competitors(player_ids.len(), max_competitors).max(2);
    let mut plan = Vec::new();

    for cycle in 0..rounds {
        let mut shuffled = player_ids.to_vec();
        shuffled.shuffle(rng);

        let valid: Vec<Vec<PlayerId>> = shuffled
            .chunks(cap)
            .map(|group| {
                let mut group = group.to_vec();
                if group.len() % 2 != 0 {
                    group.pop();
                }
                group
            })
            .filter(|group| group.len() >= 2)
            .collect();

        let heats_in_cycle = valid.len() as u32;
        for (heat, participants) in valid.into_iter().enumerate() {
            plan.push(Heat {
                participants,
                cycle,
                heat: heat as u32,
                heats_in_cycle,
            });
        }
    }

    if plan.is_empty() {
        return Err(PlanError::NotEnoughPlayers);
    }
    Ok(plan)
}

/// Pair eligible submitters into head-to-head matchups, at random. An odd
/// leftover sits the bracket out.
pub fn build_matchups(eligible: &[PlayerId], rng: &mut impl Rng) -> Vec<[PlayerId; 2]> {
    let mut shuffled = eligible.to_vec();
    shuffled.shuffle(rng);
    shuffled
        .chunks_exact(2)
        .map(|pair| [pair[0].clone(), pair[1].clone()])
        .collect()
}
