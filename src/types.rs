use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Opaque ID types for type safety
pub type PlayerId = String;
pub type ClientId = String;
pub type RoomCode = String;

/// Hard cap on roster size, matching the lobby's "PLAYERS (n/12)" limit.
pub const MAX_PLAYERS: usize = 12;

pub const DEFAULT_ROUNDS: u32 = 3;
pub const DEFAULT_NAME_PROMPT_ROUNDS: u32 = 1;
pub const DEFAULT_MAX_COMPETITORS: usize = 4;

/// Seconds a player gets per prompt; the submit deadline is this times the
/// round count.
pub const SUBMIT_SECS: u32 = 60;
/// Seconds per voting matchup.
pub const VOTE_SECS: u32 = 12;
/// Seconds the round results screen is shown before auto-advancing.
pub const RESULTS_SECS: u64 = 5;

/// Session documents and vote records expire after a day of inactivity.
pub const ROOM_TTL_SECS: u64 = 86_400;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    Lobby,
    Submitting,
    Voting,
    RoundResults,
    GameOver,
}

/// A roster entry. `score` only ever grows during a game and is reset to
/// zero on replay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Player {
    pub id: PlayerId,
    pub nickname: String,
    pub score: u32,
}

/// One heat of the round plan: a group of players who all answer the same
/// prompt within a cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Heat {
    pub participants: Vec<PlayerId>,
    pub cycle: u32,
    pub heat: u32,
    pub heats_in_cycle: u32,
}

/// A player's answer for one heat: the GIF itself plus a smaller preview.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubmissionEntry {
    pub url: String,
    pub preview: String,
}

/// A single vote in a head-to-head matchup. Stored as its own key per
/// voter, so votes never conflict with each other.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VoteSide {
    Left,
    Right,
}

impl VoteSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteSide::Left => "left",
            VoteSide::Right => "right",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "left" => Some(VoteSide::Left),
            "right" => Some(VoteSide::Right),
            _ => None,
        }
    }
}

/// Validation failures for a session document read from the store.
#[derive(Debug, thiserror::Error)]
pub enum DocError {
    #[error("rounds must be at least 1")]
    ZeroRounds,

    #[error("namePromptRounds {0} exceeds rounds {1}")]
    NamePromptRoundsOutOfRange(u32, u32),

    #[error("maxCompetitors {0} must be even and at least 2")]
    BadMaxCompetitors(usize),

    #[error("roster holds {0} players, max is {MAX_PLAYERS}")]
    TooManyPlayers(usize),

    #[error("duplicate player id {0}")]
    DuplicatePlayer(PlayerId),

    #[error("host {0} is not in the roster")]
    HostNotInRoster(ClientId),

    #[error("{prompts} prompts for {heats} heats")]
    PromptsMisaligned { prompts: usize, heats: usize },

    #[error("heat {heat} references unknown player {player}")]
    UnknownParticipant { heat: usize, player: PlayerId },

    #[error("submissions recorded for unknown player {0}")]
    UnknownSubmitter(PlayerId),

    #[error("submission array for {player} has {len} slots but the plan has {heats} heats")]
    SubmissionsOverrun {
        player: PlayerId,
        len: usize,
        heats: usize,
    },

    #[error("phase {0:?} requires a round plan")]
    MissingPlan(GamePhase),

    #[error("voting phase requires at least one matchup")]
    NoMatchups,

    #[error("currentMatchup {index} out of range for {len} matchups")]
    MatchupOutOfRange { index: usize, len: usize },

    #[error("votingRound {index} out of range for {len} heats")]
    VotingRoundOutOfRange { index: usize, len: usize },

    #[error("matchup references player {0} who is not in the roster")]
    UnknownContestant(PlayerId),
}

/// The session document: the single replicated blob of game state, stored
/// wholesale under the room key and fully re-derivable from itself.
///
/// The wire format uses camelCase field names and epoch millisecond
/// deadlines, so any client speaking the same convention can share a
/// room.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionDoc {
    pub phase: GamePhase,
    /// The client with authority over automatic transitions. Never
    /// reassigned.
    pub host: ClientId,
    pub code: RoomCode,
    pub players: Vec<Player>,

    /// Built once at game start, immutable until replay.
    #[serde(default)]
    pub round_plan: Vec<Heat>,
    /// One prompt per heat, index-aligned with `round_plan`.
    #[serde(default)]
    pub prompts: Vec<String>,

    /// Player id -> sparse per-heat submission slots.
    #[serde(default)]
    pub submissions: HashMap<PlayerId, Vec<Option<SubmissionEntry>>>,
    /// Players who have filled every heat slot assigned to them.
    #[serde(default)]
    pub done_submitting: Vec<PlayerId>,

    /// Heat currently (or most recently) being voted on.
    #[serde(default)]
    pub voting_round: usize,
    #[serde(default)]
    pub matchups: Vec<[PlayerId; 2]>,
    #[serde(default)]
    pub current_matchup: usize,
    /// Matchup-win credits accumulated within the current heat.
    #[serde(default)]
    pub round_matchup_wins: HashMap<PlayerId, u32>,

    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub submit_deadline: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub vote_deadline: Option<DateTime<Utc>>,

    /// Host-curated prompts merged into the built-in pool at game start.
    #[serde(default)]
    pub custom_prompts: Vec<String>,

    // Configuration, host-set in the lobby and read-only once the plan is
    // built.
    #[serde(default = "default_rounds")]
    pub rounds: u32,
    #[serde(default = "default_name_prompt_rounds")]
    pub name_prompt_rounds: u32,
    #[serde(default = "default_max_competitors")]
    pub max_competitors: usize,
    #[serde(default = "default_submit_secs")]
    pub submit_secs: u32,
    #[serde(default = "default_vote_secs")]
    pub vote_secs: u32,
}

fn default_rounds() -> u32 {
    DEFAULT_ROUNDS
}

fn default_name_prompt_rounds() -> u32 {
    DEFAULT_NAME_PROMPT_ROUNDS
}

fn default_max_competitors() -> usize {
    DEFAULT_MAX_COMPETITORS
}

fn default_submit_secs() -> u32 {
    SUBMIT_SECS
}

fn default_vote_secs() -> u32 {
    VOTE_SECS
}

impl SessionDoc {
    /// Fresh lobby document with the creating client as host and sole
    /// player.
    pub fn new_lobby(code: RoomCode, host: ClientId, nickname: String) -> Self {
        Self {
            phase: GamePhase::Lobby,
            host: host.clone(),
            code,
            players: vec![Player {
                id: host,
                nickname,
                score: 0,
            }],
            round_plan: Vec::new(),
            prompts: Vec::new(),
            submissions: HashMap::new(),
            done_submitting: Vec::new(),
            voting_round: 0,
            matchups: Vec::new(),
            current_matchup: 0,
            round_matchup_wins: HashMap::new(),
            submit_deadline: None,
            vote_deadline: None,
            custom_prompts: Vec::new(),
            rounds: DEFAULT_ROUNDS,
            name_prompt_rounds: DEFAULT_NAME_PROMPT_ROUNDS,
            max_competitors: DEFAULT_MAX_COMPETITORS,
            submit_secs: SUBMIT_SECS,
            vote_secs: VOTE_SECS,
        }
    }

    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn nickname_by_id(&self) -> HashMap<PlayerId, String> {
        self.players
            .iter()
            .map(|p| (p.id.clone(), p.nickname.clone()))
            .collect()
    }

    /// Check the phase-specific required fields. Called on every read from
    /// the store and before every write back — the read-modify-write
    /// boundary is the only place documents cross between clients.
    pub fn validate(&self) -> Result<(), DocError> {
        if self.rounds == 0 {
            return Err(DocError::ZeroRounds);
        }
        if self.name_prompt_rounds > self.rounds {
            return Err(DocError::NamePromptRoundsOutOfRange(
                self.name_prompt_rounds,
                self.rounds,
            ));
        }
        if self.max_competitors < 2 || self.max_competitors % 2 != 0 {
            return Err(DocError::BadMaxCompetitors(self.max_competitors));
        }
        if self.players.len() > MAX_PLAYERS {
            return Err(DocError::TooManyPlayers(self.players.len()));
        }

        let mut seen = std::collections::HashSet::new();
        for p in &self.players {
            if !seen.insert(p.id.as_str()) {
                return Err(DocError::DuplicatePlayer(p.id.clone()));
            }
        }
        if !seen.contains(self.host.as_str()) {
            return Err(DocError::HostNotInRoster(self.host.clone()));
        }

        if self.prompts.len() != self.round_plan.len() {
            return Err(DocError::PromptsMisaligned {
                prompts: self.prompts.len(),
                heats: self.round_plan.len(),
            });
        }
        for (i, heat) in self.round_plan.iter().enumerate() {
            for id in &heat.participants {
                if !seen.contains(id.as_str()) {
                    return Err(DocError::UnknownParticipant {
                        heat: i,
                        player: id.clone(),
                    });
                }
            }
        }
        for (id, slots) in &self.submissions {
            if !seen.contains(id.as_str()) {
                return Err(DocError::UnknownSubmitter(id.clone()));
            }
            if slots.len() > self.round_plan.len() {
                return Err(DocError::SubmissionsOverrun {
                    player: id.clone(),
                    len: slots.len(),
                    heats: self.round_plan.len(),
                });
            }
        }

        match self.phase {
            GamePhase::Lobby => {}
            GamePhase::Submitting => {
                if self.round_plan.is_empty() {
                    return Err(DocError::MissingPlan(self.phase));
                }
            }
            GamePhase::Voting => {
                if self.round_plan.is_empty() {
                    return Err(DocError::MissingPlan(self.phase));
                }
                if self.matchups.is_empty() {
                    return Err(DocError::NoMatchups);
                }
                if self.current_matchup >= self.matchups.len() {
                    return Err(DocError::MatchupOutOfRange {
                        index: self.current_matchup,
                        len: self.matchups.len(),
                    });
                }
                if self.voting_round >= self.round_plan.len() {
                    return Err(DocError::VotingRoundOutOfRange {
                        index: self.voting_round,
                        len: self.round_plan.len(),
                    });
                }
                for pair in &self.matchups {
                    for id in pair {
                        if !seen.contains(id.as_str()) {
                            return Err(DocError::UnknownContestant(id.clone()));
                        }
                    }
                }
            }
            GamePhase::RoundResults => {
                if self.round_plan.is_empty() {
                    return Err(DocError::MissingPlan(self.phase));
                }
                if self.voting_round >= self.round_plan.len() {
                    return Err(DocError::VotingRoundOutOfRange {
                        index: self.voting_round,
                        len: self.round_plan.len(),
                    });
                }
            }
            GamePhase::GameOver => {}
        }

        Ok(())
    }
}
