//! The phase state machine. Every transition here is guarded twice: a
//! phase check against freshly fetched state (so a transition that
//! already happened elsewhere becomes a no-op instead of corrupting the
//! document) and the client-local in-flight guard (so one client never
//! double-fires the transition it is already driving).

use super::{
    apply_heat_scores, award_uncontested_heat, record_matchup_result, GameClient, GameError,
    GameResult,
};
use crate::plan::{build_matchups, build_round_plan};
use crate::prompts::{assign_prompts, prompt_pool};
use crate::store::vote_prefix;
use crate::types::{GamePhase, PlayerId, SessionDoc};
use std::collections::HashMap;

/// Players who actually filled the submission slot for this heat.
pub fn eligible_for_heat(doc: &SessionDoc, heat: usize) -> Vec<PlayerId> {
    doc.players
        .iter()
        .filter(|p| {
            doc.submissions
                .get(&p.id)
                .and_then(|slots| slots.get(heat))
                .map(|slot| slot.is_some())
                .unwrap_or(false)
        })
        .map(|p| p.id.clone())
        .collect()
}

/// First heat index at or after `start` with at least two eligible
/// submitters. `None` means the game has nothing left to vote on.
pub fn find_next_votable_heat(doc: &SessionDoc, start: usize) -> Option<usize> {
    (start..doc.round_plan.len()).find(|&i| eligible_for_heat(doc, i).len() >= 2)
}

impl GameClient {
    /// `lobby -> submitting`: host action. Builds the whole game's heat
    /// plan and prompt list, clears per-game state and arms the submit
    /// deadline.
    pub async fn start_game(&self) -> GameResult<SessionDoc> {
        let updated = self
            .update_room(|doc| {
                if !self.is_host(&doc) {
                    return Err(GameError::NotHost("start the game"));
                }
                if doc.phase != GamePhase::Lobby {
                    return Err(GameError::WrongPhase {
                        action: "start the game",
                        phase: doc.phase,
                    });
                }
                if doc.players.len() < 2 {
                    return Err(GameError::NotEnoughPlayers);
                }

                let player_ids: Vec<PlayerId> =
                    doc.players.iter().map(|p| p.id.clone()).collect();
                let pool = prompt_pool(&doc.custom_prompts);
                let nicknames = doc.nickname_by_id();

                let (plan, prompts) = self.with_rng(|rng| {
                    let plan =
                        build_round_plan(&player_ids, doc.rounds, doc.max_competitors, rng)?;
                    let prompts = assign_prompts(
                        &pool,
                        &plan,
                        doc.rounds,
                        doc.name_prompt_rounds,
                        &nicknames,
                        rng,
                    );
                    Ok::<_, GameError>((plan, prompts))
                })?;

                let mut doc = doc;
                let total_secs = i64::from(doc.submit_secs) * i64::from(doc.rounds);
                doc.phase = GamePhase::Submitting;
                doc.round_plan = plan;
                doc.prompts = prompts;
                doc.submissions.clear();
                doc.done_submitting.clear();
                doc.voting_round = 0;
                doc.matchups.clear();
                doc.current_matchup = 0;
                doc.round_matchup_wins.clear();
                doc.vote_deadline = None;
                doc.submit_deadline =
                    Some(self.clock().now() + chrono::Duration::seconds(total_secs));
                Ok(Some(doc))
            })
            .await?;
        updated.ok_or(GameError::RoomNotFound)
    }

    /// `submitting -> voting` (or straight to `game_over`): fires when the
    /// submit deadline lapses, when the host forces it, or when the last
    /// required submission lands. Safe to invoke on an already-advanced
    /// document: the phase guard turns the repeat into a no-op.
    pub async fn start_voting(&self) -> GameResult<Option<SessionDoc>> {
        let Some(_guard) = self.begin_transition() else {
            return Ok(None);
        };
        let doc = self.fetch_room().await?;
        if doc.phase != GamePhase::Submitting {
            tracing::debug!("voting transition skipped, phase is {:?}", doc.phase);
            return Ok(None);
        }
        self.transition_to_voting(doc).await.map(Some)
    }

    /// Host override from the submission waiting screen.
    pub async fn force_start_voting(&self) -> GameResult<Option<SessionDoc>> {
        let doc = self.fetch_room().await?;
        if !self.is_host(&doc) {
            return Err(GameError::NotHost("force-start voting"));
        }
        self.start_voting().await
    }

    /// Move the given document into the next votable heat, or end the
    /// game if none remains. Also called by the last submitter with its
    /// own just-built state.
    pub(crate) async fn transition_to_voting(
        &self,
        doc: SessionDoc,
    ) -> GameResult<SessionDoc> {
        match find_next_votable_heat(&doc, doc.voting_round) {
            Some(heat) => self.enter_heat(doc, heat).await,
            None => self.finish_game(doc).await,
        }
    }

    /// `round_results -> voting | game_over`: after the results display
    /// interval or a host override, look for the next votable heat.
    pub async fn next_voting_round(&self) -> GameResult<Option<SessionDoc>> {
        let Some(_guard) = self.begin_transition() else {
            return Ok(None);
        };
        let doc = self.fetch_room().await?;
        if doc.phase != GamePhase::RoundResults {
            tracing::debug!("round advance skipped, phase is {:?}", doc.phase);
            return Ok(None);
        }
        let updated = match find_next_votable_heat(&doc, doc.voting_round + 1) {
            Some(heat) => self.enter_heat(doc, heat).await?,
            None => self.finish_game(doc).await?,
        };
        Ok(Some(updated))
    }

    /// `voting -> voting | round_results`: tally the current matchup and
    /// advance. After the heat's last matchup, heat-level scores land on
    /// the roster.
    pub async fn advance_matchup(&self) -> GameResult<Option<SessionDoc>> {
        let Some(_guard) = self.begin_transition() else {
            return Ok(None);
        };
        let mut doc = self.fetch_room().await?;
        if doc.phase != GamePhase::Voting {
            tracing::debug!("matchup advance skipped, phase is {:?}", doc.phase);
            return Ok(None);
        }

        let mi = doc.current_matchup;
        let [left, right] = doc.matchups[mi].clone();
        let (lv, rv) = self.tally_matchup(&doc, doc.voting_round, mi).await;

        let mut wins = doc.round_matchup_wins.clone();
        record_matchup_result(&mut wins, &left, &right, lv, rv);

        let next = mi + 1;
        if next >= doc.matchups.len() {
            doc.players = apply_heat_scores(&doc.players, &wins);
            doc.phase = GamePhase::RoundResults;
            doc.round_matchup_wins = wins;
            doc.current_matchup = next;
            doc.vote_deadline = None;
        } else {
            doc.round_matchup_wins = wins;
            doc.current_matchup = next;
            doc.vote_deadline = Some(
                self.clock().now() + chrono::Duration::seconds(i64::from(doc.vote_secs)),
            );
        }

        self.write_room(&doc).await?;
        Ok(Some(doc))
    }

    /// `game_over -> lobby`: zero the scores, clear the plan and
    /// submissions, drop the room's vote records (best-effort) and keep
    /// roster plus configuration. A no-op unless the game is over.
    pub async fn play_again(&self) -> GameResult<SessionDoc> {
        let doc = self.fetch_room().await?;
        if doc.phase != GamePhase::GameOver {
            return Ok(doc);
        }

        if let Err(e) = self.store().delete_by_prefix(&vote_prefix(&doc.code)).await {
            tracing::warn!("failed to clear vote records for {}: {e}", doc.code);
        }

        let mut doc = doc;
        doc.phase = GamePhase::Lobby;
        for p in &mut doc.players {
            p.score = 0;
        }
        doc.round_plan.clear();
        doc.prompts.clear();
        doc.submissions.clear();
        doc.done_submitting.clear();
        doc.voting_round = 0;
        doc.matchups.clear();
        doc.current_matchup = 0;
        doc.round_matchup_wins.clear();
        doc.submit_deadline = None;
        doc.vote_deadline = None;

        self.write_room(&doc).await?;
        Ok(doc)
    }

    /// Seat the given heat for voting. Two-player games (where the voter
    /// pool would be empty) skip the vote entirely: every eligible
    /// submitter takes a flat point as a tied winner and the heat goes
    /// straight to results.
    async fn enter_heat(&self, mut doc: SessionDoc, heat: usize) -> GameResult<SessionDoc> {
        let eligible = eligible_for_heat(&doc, heat);

        if doc.players.len() <= 2 {
            let mut wins = HashMap::new();
            for id in &eligible {
                wins.insert(id.clone(), 1);
            }
            doc.players = award_uncontested_heat(&doc.players, &eligible);
            doc.voting_round = heat;
            doc.phase = GamePhase::RoundResults;
            doc.matchups = vec![[eligible[0].clone(), eligible[1].clone()]];
            doc.current_matchup = 0;
            doc.round_matchup_wins = wins;
            doc.vote_deadline = None;
            self.write_room(&doc).await?;
            return Ok(doc);
        }

        let matchups = self.with_rng(|rng| build_matchups(&eligible, rng));
        doc.voting_round = heat;
        doc.phase = GamePhase::Voting;
        doc.matchups = matchups;
        doc.current_matchup = 0;
        doc.round_matchup_wins.clear();
        doc.vote_deadline =
            Some(self.clock().now() + chrono::Duration::seconds(i64::from(doc.vote_secs)));
        self.write_room(&doc).await?;
        Ok(doc)
    }

    /// Any transition that cannot find a valid next heat terminates the
    /// game instead of erroring.
    async fn finish_game(&self, mut doc: SessionDoc) -> GameResult<SessionDoc> {
        doc.phase = GamePhase::GameOver;
        doc.submit_deadline = None;
        doc.vote_deadline = None;
        self.write_room(&doc).await?;
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::GameClient;
    use crate::store::{KvStore, MemoryStore};
    use crate::sync::ManualClock;
    use crate::types::SubmissionEntry;
    use std::sync::Arc;

    fn setup() -> (Arc<dyn KvStore>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new(clock.clone()));
        (store, clock)
    }

    fn client(
        store: &Arc<dyn KvStore>,
        clock: &Arc<ManualClock>,
        id: &str,
        seed: u64,
    ) -> GameClient {
        GameClient::with_identity_and_seed(store.clone(), clock.clone(), id, seed)
    }

    async fn lobby_of(n: usize) -> (Arc<dyn KvStore>, Arc<ManualClock>, Vec<GameClient>) {
        let (store, clock) = setup();
        let mut clients = Vec::new();
        let host = client(&store, &clock, "p0", 1);
        let doc = host.create_room("Player 0".to_string()).await.unwrap();
        clients.push(host);
        for i in 1..n {
            let c = client(&store, &clock, &format!("p{i}"), i as u64 + 1);
            c.join_room(&doc.code, format!("Player {i}")).await.unwrap();
            clients.push(c);
        }
        (store, clock, clients)
    }

    async fn submit_all(clients: &[GameClient]) {
        // each player answers every assigned heat; the last answer
        // triggers the voting transition on that player's client
        loop {
            let doc = clients[0].fetch_room().await.unwrap();
            if doc.phase != GamePhase::Submitting {
                break;
            }
            let mut progressed = false;
            for c in clients {
                let doc = c.fetch_room().await.unwrap();
                if doc.phase != GamePhase::Submitting {
                    break;
                }
                if super::super::next_open_slot(&doc, c.identity()).is_some() {
                    c.record_submission("http://gif", "http://preview")
                        .await
                        .unwrap();
                    progressed = true;
                }
            }
            if !progressed {
                break;
            }
        }
    }

    #[tokio::test]
    async fn start_game_builds_plan_and_deadline() {
        let (_, clock, clients) = lobby_of(4).await;
        let doc = clients[0].start_game().await.unwrap();

        assert_eq!(doc.phase, GamePhase::Submitting);
        assert_eq!(doc.prompts.len(), doc.round_plan.len());
        assert!(!doc.round_plan.is_empty());
        let deadline = doc.submit_deadline.unwrap();
        let expected = clock.now() + chrono::Duration::seconds(60 * 3);
        assert_eq!(deadline.timestamp(), expected.timestamp());
    }

    #[tokio::test]
    async fn start_game_requires_two_players() {
        let (_, _, clients) = lobby_of(1).await;
        assert!(matches!(
            clients[0].start_game().await,
            Err(GameError::NotEnoughPlayers)
        ));
    }

    #[tokio::test]
    async fn guest_cannot_start_game() {
        let (_, _, clients) = lobby_of(3).await;
        assert!(matches!(
            clients[1].start_game().await,
            Err(GameError::NotHost(_))
        ));
    }

    #[tokio::test]
    async fn last_submitter_triggers_voting() {
        let (_, _, clients) = lobby_of(4).await;
        clients[0].start_game().await.unwrap();
        submit_all(&clients).await;

        let doc = clients[0].fetch_room().await.unwrap();
        assert_eq!(doc.phase, GamePhase::Voting);
        assert!(!doc.matchups.is_empty());
        assert!(doc.vote_deadline.is_some());
        // matchup contestants are eligible submitters of the seated heat
        let eligible = eligible_for_heat(&doc, doc.voting_round);
        for pair in &doc.matchups {
            assert!(eligible.contains(&pair[0]));
            assert!(eligible.contains(&pair[1]));
        }
    }

    #[tokio::test]
    async fn start_voting_twice_is_idempotent() {
        let (_, _, clients) = lobby_of(4).await;
        clients[0].start_game().await.unwrap();
        submit_all(&clients).await;

        let before = clients[0].fetch_room().await.unwrap();
        assert_eq!(before.phase, GamePhase::Voting);

        // phase is no longer submitting: the repeat declines to act
        let repeat = clients[0].start_voting().await.unwrap();
        assert!(repeat.is_none());
        let after = clients[0].fetch_room().await.unwrap();
        assert_eq!(after, before);
    }

    #[tokio::test]
    async fn no_submissions_ends_the_game() {
        let (_, _, clients) = lobby_of(3).await;
        clients[0].start_game().await.unwrap();
        // nobody submitted anything; deadline-driven transition finds no
        // votable heat
        let doc = clients[0].start_voting().await.unwrap().unwrap();
        assert_eq!(doc.phase, GamePhase::GameOver);
    }

    #[tokio::test]
    async fn two_player_game_skips_voting() {
        let (_, _, clients) = lobby_of(2).await;
        clients[0].start_game().await.unwrap();
        submit_all(&clients).await;

        let doc = clients[0].fetch_room().await.unwrap();
        assert_eq!(doc.phase, GamePhase::RoundResults);
        // both players scored the flat uncontested point
        assert!(doc.players.iter().all(|p| p.score >= 1));
    }

    #[tokio::test]
    async fn matchup_advance_applies_heat_scores() {
        let (_, _, clients) = lobby_of(4).await;
        clients[0].start_game().await.unwrap();
        submit_all(&clients).await;

        let mut doc = clients[0].fetch_room().await.unwrap();
        assert_eq!(doc.phase, GamePhase::Voting);

        // unanimous left votes in every matchup of the first heat
        let total_matchups = doc.matchups.len();
        let mut left_winners = Vec::new();
        for _ in 0..total_matchups {
            let pair = doc.matchups[doc.current_matchup].clone();
            left_winners.push(pair[0].clone());
            for c in &clients {
                if !pair.contains(c.identity()) {
                    c.cast_vote(crate::types::VoteSide::Left).await.unwrap();
                }
            }
            doc = clients[0].advance_matchup().await.unwrap().unwrap();
        }

        assert_eq!(doc.phase, GamePhase::RoundResults);
        let credits: u32 = doc.round_matchup_wins.values().sum();
        assert_eq!(credits as usize, total_matchups);
        for id in &left_winners {
            assert!(doc.round_matchup_wins.contains_key(id));
        }
    }

    #[tokio::test]
    async fn play_again_resets_scores_and_plan() {
        let (store, _, clients) = lobby_of(3).await;
        clients[0].start_game().await.unwrap();
        // straight to game over (no submissions)
        clients[0].start_voting().await.unwrap();

        // leave a stray vote record to prove prefix cleanup
        let code = clients[0].room_code().await.unwrap();
        store
            .set(
                &crate::store::vote_key(&code, 0, 0, "p1"),
                "left",
                std::time::Duration::from_secs(60),
            )
            .await
            .unwrap();

        let doc = clients[1].play_again().await.unwrap();
        assert_eq!(doc.phase, GamePhase::Lobby);
        assert!(doc.players.iter().all(|p| p.score == 0));
        assert!(doc.round_plan.is_empty());
        assert!(doc.prompts.is_empty());
        assert_eq!(doc.players.len(), 3, "roster survives replay");
        assert!(store
            .get(&crate::store::vote_key(&code, 0, 0, "p1"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn votable_heat_search_skips_thin_heats() {
        let (_, _, clients) = lobby_of(4).await;
        clients[0].start_game().await.unwrap();

        // only one player submits anything: no heat reaches 2 eligible
        clients[0]
            .record_submission("http://gif", "http://preview")
            .await
            .unwrap();
        let doc = clients[0].fetch_room().await.unwrap();
        assert_eq!(find_next_votable_heat(&doc, 0), None);

        // a second submitter makes their shared heat votable only if they
        // share one
        let mut doc = doc;
        for heat in 0..doc.round_plan.len() {
            let participants = doc.round_plan[heat].participants.clone();
            doc.submissions.clear();
            for id in participants.iter().take(2) {
                let slots = doc.submissions.entry(id.clone()).or_default();
                slots.resize(heat + 1, None);
                slots[heat] = Some(SubmissionEntry {
                    url: "u".into(),
                    preview: "p".into(),
                });
            }
            assert_eq!(find_next_votable_heat(&doc, 0), Some(heat));
        }
    }
}
