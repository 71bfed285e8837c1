//! Prompt assigner: maps the heat plan to prompts, including the
//! name-personalized cycles.

use crate::types::{Heat, PlayerId};
use rand::seq::{IndexedRandom, SliceRandom};
use rand::Rng;
use std::collections::{HashMap, HashSet};

/// Built-in prompt pool. Host customs are merged in at game start.
pub const BUILT_IN_PROMPTS: &[&str] = &[
    "When you realize it's Monday tomorrow",
    "Me explaining my life choices to my parents",
    "When the WiFi suddenly cuts out",
    "That moment when you see your ex in public",
    "When someone says 'we need to talk'",
    "Me trying to adult",
    "When the food finally arrives",
    "My reaction when someone spoils the ending",
    "Finding $20 in old pants",
    "How I feel every Friday afternoon",
    "Me pretending to work on Zoom",
    "When someone asks if I'm really okay",
    "After sending a risky text",
    "Me after one cup of coffee",
    "How I walk into the weekend",
    "When someone takes the last slice of pizza",
    "When someone says 'just a quick question'",
    "Me on a diet vs. smelling pizza",
    "When the meeting could've been an email",
    "My face during awkward silences",
    "Me trying to explain my sense of humor",
    "When autocorrect betrays me",
    "Me five minutes before a deadline",
    "When the plan actually works",
    "How I look vs. how I feel",
    "Me opening my bank app after brunch",
    "That moment the group chat goes silent",
    "When my package says delivered but isn't",
    "Me acting normal after tripping in public",
    "When your camera turns on unexpectedly",
    "Me hearing my own voice in a recording",
    "When someone replies 'k' to a paragraph",
    "Me checking if the door is locked again",
    "When the elevator stops on every floor",
    "Me trying to fold a fitted sheet",
    "When the playlist ruins your gym momentum",
    "Me pretending I know wine flavors",
    "When the password needs one more symbol",
    "Me joining a call exactly on time",
    "When your pet judges all your decisions",
    "Me reading terms and conditions like",
    "When someone starts clapping on airplane landing",
    "Me trying to remember why I entered",
    "When a recipe says 'prep 10 minutes'",
    "Me after saying 'one more episode'",
    "When your alarm rings from a dream",
    "Me trying to take a group selfie",
    "When your phone battery hits one percent",
    "Me seeing my old tweets resurface",
    "When someone says 'this won't hurt'",
    "When the QR menu won't load",
    "Me pretending the spicy food is fine",
    "When your coffee order is wrong again",
    "Me in winter before the shower",
    "When someone takes forever at the ATM",
    "Me opening LinkedIn after one bad day",
    "When the app asks for another update",
    "Me trying to stay awake after lunch",
    "When your food arrives and no utensils",
    "Me hearing 'let's go around and share'",
    "When your joke doesn't land at all",
    "Me searching symptoms at two a.m.",
    "When my cart total doubles at checkout",
    "Me trying to assemble IKEA furniture",
    "When your ride share is two minutes away",
    "Me accidentally liking a post from 2018",
    "When someone says 'be yourself' in interviews",
    "Me when the waiter says 'enjoy'",
    "When your sock gets wet unexpectedly",
    "Me trying to parallel park under pressure",
    "When the fire alarm tests during nap",
    "Me introducing two friends with same name",
    "When your boss says 'quick sync?'",
    "Me watching someone type with one finger",
    "When the chip bag is mostly air",
    "Me pretending I understand crypto",
    "When your text says delivered not read",
    "Me preparing to cancel a free trial",
    "When the printer starts making new noises",
    "Me trying to leave without saying goodbye",
];

/// The full prompt pool for a game: built-ins plus the host's customs.
pub fn prompt_pool(custom_prompts: &[String]) -> Vec<String> {
    BUILT_IN_PROMPTS
        .iter()
        .map(|p| p.to_string())
        .chain(custom_prompts.iter().cloned())
        .collect()
}

/// Build a prompt that works up to three of the heat's nicknames into a
/// fixed template. Falls back to generic placeholders when fewer than two
/// distinct names are available.
pub fn build_name_prompt(names: &[String], rng: &mut impl Rng) -> String {
    let mut uniq: Vec<&str> = Vec::new();
    for name in names {
        let name = name.trim();
        if !name.is_empty() && !uniq.contains(&name) {
            uniq.push(name);
        }
        if uniq.len() == 3 {
            break;
        }
    }

    let a = uniq.first().copied().unwrap_or("someone");
    let b = uniq.get(1).copied().unwrap_or("someone else");
    let c = uniq.get(2).copied().unwrap_or("the whole crew");
    let trio = if uniq.len() >= 3 {
        format!("{a}, {b}, and {c}")
    } else {
        format!("{a} and {b}")
    };

    let templates = [
        format!("When {a} says \"just one game\""),
        format!("Me watching {a} and {b} choose chaos"),
        format!("That moment when {trio} share one brain cell"),
        format!("When {a} and {b} both think they're right"),
        format!("Me trying to keep up with {trio}"),
        format!("That moment when {a} starts and {b} escalates"),
        format!("When {trio} act like this was a good idea"),
        format!("Me after trusting {a}'s \"perfect\" plan"),
    ];
    let i = rng.random_range(0..templates.len());
    templates[i].clone()
}

/// Choose which cycles get name-based prompts: exactly
/// `name_prompt_rounds` distinct indices out of `[0, rounds)`, clamped.
fn pick_name_cycles(rounds: u32, name_prompt_rounds: u32, rng: &mut impl Rng) -> HashSet<u32> {
    let mut all: Vec<u32> = (0..rounds).collect();
    all.shuffle(rng);
    all.into_iter()
        .take(name_prompt_rounds.min(rounds) as usize)
        .collect()
}

/// Draw `count` prompts from the pool without replacement; once the pool
/// is exhausted, repeats are allowed.
fn pick_prompts(pool: &[String], count: usize, rng: &mut impl Rng) -> Vec<String> {
    let mut shuffled = pool.to_vec();
    shuffled.shuffle(rng);
    if count <= shuffled.len() {
        shuffled.truncate(count);
        return shuffled;
    }
    let mut picked = shuffled;
    while picked.len() < count {
        // pool is non-empty whenever count > 0
        if let Some(extra) = pool.choose(rng) {
            picked.push(extra.clone());
        } else {
            break;
        }
    }
    picked
}

/// Assign one prompt per heat, in plan order. Heats in name-based cycles
/// interpolate participant nicknames; all others draw from the pool.
pub fn assign_prompts(
    pool: &[String],
    plan: &[Heat],
    rounds: u32,
    name_prompt_rounds: u32,
    nickname_by_id: &HashMap<PlayerId, String>,
    rng: &mut impl Rng,
) -> Vec<String> {
    let name_cycles = pick_name_cycles(rounds, name_prompt_rounds, rng);
    let name_slots = plan
        .iter()
        .filter(|h| name_cycles.contains(&h.cycle))
        .count();
    let standard = pick_prompts(pool, plan.len().saturating_sub(name_slots), rng);
    let mut standard_idx = 0;

    plan.iter()
        .map(|heat| {
            if !name_cycles.contains(&heat.cycle) {
                let picked = standard[standard_idx].clone();
                standard_idx += 1;
                return picked;
            }
            let names: Vec<String> = heat
                .participants
                .iter()
                .filter_map(|id| nickname_by_id.get(id).cloned())
                .collect();
            build_name_prompt(&names, rng)
        })
        .collect()
}
