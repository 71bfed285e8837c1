use super::{GameClient, GameError, GameResult};
use crate::types::{GamePhase, PlayerId, SessionDoc, SubmissionEntry};

/// Heat indices this player competes in, in plan order.
pub fn assigned_heats(doc: &SessionDoc, player_id: &str) -> Vec<usize> {
    doc.round_plan
        .iter()
        .enumerate()
        .filter(|(_, heat)| heat.participants.iter().any(|id| id == player_id))
        .map(|(i, _)| i)
        .collect()
}

/// How many of the given heat slots the player has filled.
pub fn submitted_count(doc: &SessionDoc, player_id: &str, heats: &[usize]) -> usize {
    let slots = doc.submissions.get(player_id);
    heats
        .iter()
        .filter(|&&i| {
            slots
                .and_then(|s| s.get(i))
                .map(|slot| slot.is_some())
                .unwrap_or(false)
        })
        .count()
}

/// First assigned heat the player has not answered yet.
pub fn next_open_slot(doc: &SessionDoc, player_id: &str) -> Option<usize> {
    let slots = doc.submissions.get(player_id);
    assigned_heats(doc, player_id).into_iter().find(|&i| {
        slots
            .and_then(|s| s.get(i))
            .map(|slot| slot.is_none())
            .unwrap_or(true)
    })
}

/// True once every player with at least one assigned heat has filled all
/// their slots — the early trigger for voting.
pub fn all_required_done(doc: &SessionDoc) -> bool {
    doc.players.iter().all(|p| {
        let heats = assigned_heats(doc, &p.id);
        heats.is_empty() || submitted_count(doc, &p.id, &heats) == heats.len()
    })
}

impl GameClient {
    /// Record this player's GIF for their next unanswered heat. Works
    /// against freshly fetched state so concurrent submitters don't
    /// clobber each other's earlier answers. When the last required
    /// submission lands, the submitter itself drives the voting
    /// transition.
    pub async fn record_submission(
        &self,
        url: impl Into<String>,
        preview: impl Into<String>,
    ) -> GameResult<SessionDoc> {
        let entry = SubmissionEntry {
            url: url.into(),
            preview: preview.into(),
        };
        let me = self.identity().clone();

        let doc = self.fetch_room().await?;
        if doc.phase != GamePhase::Submitting {
            return Err(GameError::WrongPhase {
                action: "submit",
                phase: doc.phase,
            });
        }

        let Some(slot) = next_open_slot(&doc, &me) else {
            // all assigned heats answered already
            return Ok(doc);
        };

        let mut doc = doc;
        let slots = doc.submissions.entry(me.clone()).or_default();
        if slots.len() <= slot {
            slots.resize(slot + 1, None);
        }
        slots[slot] = Some(entry);

        let heats = assigned_heats(&doc, &me);
        let now_done = submitted_count(&doc, &me, &heats) == heats.len();
        doc.done_submitting.retain(|id| id != &me);
        if now_done {
            doc.done_submitting.push(me);
        }

        if all_required_done(&doc) {
            if let Some(_guard) = self.begin_transition() {
                return self.transition_to_voting(doc).await;
            }
        }

        self.write_room(&doc).await?;
        Ok(doc)
    }

    /// Per-player (done, total) submission progress, for waiting screens.
    pub fn submission_progress(&self, doc: &SessionDoc) -> Vec<(PlayerId, usize, usize)> {
        doc.players
            .iter()
            .map(|p| {
                let heats = assigned_heats(doc, &p.id);
                let done = submitted_count(doc, &p.id, &heats);
                (p.id.clone(), done, heats.len())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Heat, Player};

    fn doc() -> SessionDoc {
        let mut doc = SessionDoc::new_lobby("AB12".into(), "a".into(), "Ann".into());
        for (id, nick) in [("b", "Ben"), ("c", "Cal")] {
            doc.players.push(Player {
                id: id.into(),
                nickname: nick.into(),
                score: 0,
            });
        }
        doc.phase = GamePhase::Submitting;
        doc.round_plan = vec![
            Heat {
                participants: vec!["a".into(), "b".into()],
                cycle: 0,
                heat: 0,
                heats_in_cycle: 2,
            },
            Heat {
                participants: vec!["b".into(), "c".into()],
                cycle: 0,
                heat: 1,
                heats_in_cycle: 2,
            },
        ];
        doc.prompts = vec!["one".into(), "two".into()];
        doc
    }

    fn fill(doc: &mut SessionDoc, player: &str, heat: usize) {
        let slots = doc.submissions.entry(player.to_string()).or_default();
        if slots.len() <= heat {
            slots.resize(heat + 1, None);
        }
        slots[heat] = Some(SubmissionEntry {
            url: "u".into(),
            preview: "p".into(),
        });
    }

    #[test]
    fn assigned_heats_follow_the_plan() {
        let doc = doc();
        assert_eq!(assigned_heats(&doc, "a"), vec![0]);
        assert_eq!(assigned_heats(&doc, "b"), vec![0, 1]);
        assert_eq!(assigned_heats(&doc, "c"), vec![1]);
        assert!(assigned_heats(&doc, "stranger").is_empty());
    }

    #[test]
    fn next_open_slot_skips_filled_heats() {
        let mut doc = doc();
        assert_eq!(next_open_slot(&doc, "b"), Some(0));
        fill(&mut doc, "b", 0);
        assert_eq!(next_open_slot(&doc, "b"), Some(1));
        fill(&mut doc, "b", 1);
        assert_eq!(next_open_slot(&doc, "b"), None);
    }

    #[test]
    fn all_required_done_needs_every_assigned_slot() {
        let mut doc = doc();
        assert!(!all_required_done(&doc));
        fill(&mut doc, "a", 0);
        fill(&mut doc, "b", 0);
        fill(&mut doc, "b", 1);
        assert!(!all_required_done(&doc), "c has not submitted");
        fill(&mut doc, "c", 1);
        assert!(all_required_done(&doc));
    }

    #[test]
    fn submitted_count_ignores_unassigned_slots() {
        let mut doc = doc();
        fill(&mut doc, "a", 0);
        assert_eq!(submitted_count(&doc, "a", &[0]), 1);
        assert_eq!(submitted_count(&doc, "a", &[1]), 0);
    }
}
