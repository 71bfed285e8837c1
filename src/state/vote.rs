use super::{GameClient, GameError, GameResult};
use crate::store::vote_key;
use crate::types::{GamePhase, PlayerId, SessionDoc, VoteSide, ROOM_TTL_SECS};
use futures::future::join_all;
use std::time::Duration;

/// Everyone in the roster except the two contestants.
pub fn eligible_voters(doc: &SessionDoc, matchup: &[PlayerId; 2]) -> Vec<PlayerId> {
    doc.players
        .iter()
        .filter(|p| p.id != matchup[0] && p.id != matchup[1])
        .map(|p| p.id.clone())
        .collect()
}

impl GameClient {
    /// This client's recorded vote for the current matchup, if any.
    pub async fn my_vote(&self, doc: &SessionDoc) -> Option<VoteSide> {
        let key = vote_key(
            &doc.code,
            doc.voting_round,
            doc.current_matchup,
            self.identity(),
        );
        match self.store().get(&key).await {
            Ok(Some(raw)) => VoteSide::parse(&raw),
            _ => None,
        }
    }

    /// Cast this client's vote for the current matchup. The vote lives
    /// under its own per-voter key, so concurrent voters never conflict.
    /// When the last eligible voter's record lands, the shared vote
    /// deadline is collapsed so every client sees the window close early.
    pub async fn cast_vote(&self, side: VoteSide) -> GameResult<()> {
        let doc = self.fetch_room().await?;
        if doc.phase != GamePhase::Voting {
            return Err(GameError::WrongPhase {
                action: "vote",
                phase: doc.phase,
            });
        }
        let matchup = doc.matchups[doc.current_matchup].clone();
        if matchup.contains(self.identity()) {
            return Err(GameError::ContestantCannotVote);
        }

        let key = vote_key(
            &doc.code,
            doc.voting_round,
            doc.current_matchup,
            self.identity(),
        );
        self.store()
            .set(&key, side.as_str(), Duration::from_secs(ROOM_TTL_SECS))
            .await?;

        if self.all_votes_in(&doc, &matchup).await {
            self.collapse_vote_deadline(doc).await?;
        }
        Ok(())
    }

    /// Whether every eligible voter has a vote record for the current
    /// matchup. Store errors count as a missing vote; the next poll
    /// retries.
    async fn all_votes_in(&self, doc: &SessionDoc, matchup: &[PlayerId; 2]) -> bool {
        let voters = eligible_voters(doc, matchup);
        if voters.is_empty() {
            return false;
        }
        let store = self.store();
        let checks = voters.iter().map(|voter| {
            let key = vote_key(&doc.code, doc.voting_round, doc.current_matchup, voter);
            let store = store.clone();
            async move { matches!(store.get(&key).await, Ok(Some(_))) }
        });
        join_all(checks).await.into_iter().all(|voted| voted)
    }

    /// Pull the shared deadline just behind "now" so every client's
    /// countdown hits zero on its next tick.
    async fn collapse_vote_deadline(&self, doc: SessionDoc) -> GameResult<()> {
        let mut doc = doc;
        doc.vote_deadline = Some(self.clock().now() - chrono::Duration::seconds(1));
        self.write_room(&doc).await?;
        Ok(())
    }

    /// Count the stored votes for one matchup of one heat. Missing and
    /// unreadable records simply don't count.
    pub async fn tally_matchup(
        &self,
        doc: &SessionDoc,
        heat: usize,
        matchup_index: usize,
    ) -> (u32, u32) {
        let store = self.store();
        let lookups = doc.players.iter().map(|p| {
            let key = vote_key(&doc.code, heat, matchup_index, &p.id);
            let store = store.clone();
            async move {
                match store.get(&key).await {
                    Ok(Some(raw)) => VoteSide::parse(&raw),
                    _ => None,
                }
            }
        });

        let mut left = 0;
        let mut right = 0;
        for side in join_all(lookups).await.into_iter().flatten() {
            match side {
                VoteSide::Left => left += 1,
                VoteSide::Right => right += 1,
            }
        }
        (left, right)
    }
}
