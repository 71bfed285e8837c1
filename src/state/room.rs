use super::{GameClient, GameError, GameResult};
use crate::types::{GamePhase, Player, RoomCode, SessionDoc, MAX_PLAYERS};
use rand::Rng;

/// Safe character set for room codes (excludes 0/O, 1/I/L to avoid confusion)
const CODE_CHARS: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const CODE_LENGTH: usize = 4;

const MAX_CUSTOM_PROMPT_CHARS: usize = 120;

fn generate_room_code(rng: &mut impl Rng) -> RoomCode {
    (0..CODE_LENGTH)
        .map(|_| CODE_CHARS[rng.random_range(0..CODE_CHARS.len())] as char)
        .collect()
}

fn ensure_host_in_lobby(
    client: &GameClient,
    doc: &SessionDoc,
    action: &'static str,
) -> GameResult<()> {
    if !client.is_host(doc) {
        return Err(GameError::NotHost(action));
    }
    if doc.phase != GamePhase::Lobby {
        return Err(GameError::WrongPhase {
            action,
            phase: doc.phase,
        });
    }
    Ok(())
}

impl GameClient {
    /// Create a room and become its host. Codes are retried on the rare
    /// collision with a still-live room.
    pub async fn create_room(&self, nickname: String) -> GameResult<SessionDoc> {
        let code = loop {
            let candidate = self.with_rng(|rng| generate_room_code(rng));
            match self.fetch_room_by_code(&candidate).await {
                Err(GameError::RoomNotFound) => break candidate,
                Err(e) => return Err(e),
                Ok(_) => continue,
            }
        };

        let doc = SessionDoc::new_lobby(code.clone(), self.identity().clone(), nickname);
        self.write_room(&doc).await?;
        self.set_room(Some(code)).await;
        tracing::info!("created room {}", doc.code);
        Ok(doc)
    }

    /// Join an existing lobby. Looking up an unknown code reports "Room
    /// not found" without touching any state; joining a room we are
    /// already in is a no-op.
    pub async fn join_room(&self, code: &str, nickname: String) -> GameResult<SessionDoc> {
        let code = code.trim().to_uppercase();
        let doc = self.fetch_room_by_code(&code).await?;

        if doc.player(self.identity()).is_some() {
            self.set_room(Some(code)).await;
            return Ok(doc);
        }
        if doc.phase != GamePhase::Lobby {
            return Err(GameError::GameInProgress);
        }
        if doc.players.len() >= MAX_PLAYERS {
            return Err(GameError::RoomFull);
        }

        let mut doc = doc;
        doc.players.push(Player {
            id: self.identity().clone(),
            nickname,
            score: 0,
        });
        self.write_room(&doc).await?;
        self.set_room(Some(code)).await;
        Ok(doc)
    }

    /// Leaving cleans up only this client's binding; writes already made
    /// to the store are never retracted.
    pub async fn leave(&self) {
        self.set_room(None).await;
    }

    /// Remove a player from the lobby roster. The kicked player's own
    /// client notices the missing id on its next poll.
    pub async fn kick_player(&self, target: &str) -> GameResult<()> {
        let target = target.to_string();
        self.update_room(|doc| {
            ensure_host_in_lobby(self, &doc, "kick players")?;
            if target == doc.host {
                return Err(GameError::NotHost("be kicked"));
            }
            let mut doc = doc;
            doc.players.retain(|p| p.id != target);
            Ok(Some(doc))
        })
        .await?;
        Ok(())
    }

    /// Apply a host-only lobby setting and return the updated document.
    async fn update_setting<F>(&self, apply: F) -> GameResult<SessionDoc>
    where
        F: FnOnce(&mut SessionDoc),
    {
        match self
            .update_room(|doc| {
                ensure_host_in_lobby(self, &doc, "change settings")?;
                let mut doc = doc;
                apply(&mut doc);
                Ok(Some(doc))
            })
            .await?
        {
            Some(doc) => Ok(doc),
            None => self.fetch_room().await,
        }
    }

    pub async fn set_rounds(&self, rounds: u32) -> GameResult<SessionDoc> {
        self.update_setting(|doc| {
            doc.rounds = rounds.max(1);
            doc.name_prompt_rounds = doc.name_prompt_rounds.min(doc.rounds);
        })
        .await
    }

    pub async fn set_name_prompt_rounds(&self, count: u32) -> GameResult<SessionDoc> {
        self.update_setting(|doc| {
            doc.name_prompt_rounds = count.min(doc.rounds);
        })
        .await
    }

    pub async fn set_max_competitors(&self, max: usize) -> GameResult<SessionDoc> {
        self.update_setting(|doc| {
            doc.max_competitors = if max < 2 { 2 } else { max - max % 2 };
        })
        .await
    }

    pub async fn set_submit_secs(&self, secs: u32) -> GameResult<SessionDoc> {
        self.update_setting(|doc| doc.submit_secs = secs.max(1)).await
    }

    pub async fn set_vote_secs(&self, secs: u32) -> GameResult<SessionDoc> {
        self.update_setting(|doc| doc.vote_secs = secs.max(1)).await
    }

    /// Add a host-curated prompt to the game's pool. Blank and duplicate
    /// prompts are ignored; overlong ones are truncated.
    pub async fn add_custom_prompt(&self, text: &str) -> GameResult<SessionDoc> {
        let mut trimmed = text.trim().to_string();
        trimmed.truncate(MAX_CUSTOM_PROMPT_CHARS);
        match self
            .update_room(|doc| {
                ensure_host_in_lobby(self, &doc, "edit prompts")?;
                if trimmed.is_empty() || doc.custom_prompts.contains(&trimmed) {
                    return Ok(None);
                }
                let mut doc = doc;
                doc.custom_prompts.push(trimmed);
                Ok(Some(doc))
            })
            .await?
        {
            Some(doc) => Ok(doc),
            None => self.fetch_room().await,
        }
    }

    pub async fn remove_custom_prompt(&self, text: &str) -> GameResult<SessionDoc> {
        let text = text.to_string();
        match self
            .update_room(|doc| {
                ensure_host_in_lobby(self, &doc, "edit prompts")?;
                let mut doc = doc;
                doc.custom_prompts.retain(|p| p != &text);
                Ok(Some(doc))
            })
            .await?
        {
            Some(doc) => Ok(doc),
            None => self.fetch_room().await,
        }
    }
}
