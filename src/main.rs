use std::io::{BufRead, Write};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gifclash::driver::{Driver, GameEvent};
use gifclash::llm::{LlmConfig, SuggestError};
use gifclash::search::{GifEntry, GifSearcher};
use gifclash::state::{self, GameClient};
use gifclash::store::{HttpStore, KvStore, MemoryStore};
use gifclash::sync::{spawn_room_poller, SystemClock, POLL_INTERVAL};
use gifclash::types::{GamePhase, SessionDoc, VoteSide};

fn prompt_line(label: &str) -> String {
    print!("{label}: ");
    let _ = std::io::stdout().flush();
    let mut line = String::new();
    let _ = std::io::stdin().lock().read_line(&mut line);
    line.trim().to_string()
}

/// Forward stdin lines into the async loop.
fn spawn_stdin_lines() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gifclash=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let clock = Arc::new(SystemClock);
    let store: Arc<dyn KvStore> = match std::env::var("GIFCLASH_STORE_URL") {
        Ok(url) if !url.trim().is_empty() => Arc::new(HttpStore::new(url.trim())),
        _ => {
            tracing::warn!(
                "GIFCLASH_STORE_URL not set - using an in-process store, \
                 other machines cannot join this room"
            );
            Arc::new(MemoryStore::new(clock.clone()))
        }
    };

    let client = Arc::new(GameClient::new(store.clone(), clock));
    let searcher = GifSearcher::from_env();
    let llm_config = LlmConfig::from_env();

    let nickname = prompt_line("Nickname");
    if nickname.is_empty() {
        eprintln!("A nickname is required");
        return;
    }
    let code_input = prompt_line("Room code (empty to create a room)");

    let doc = if code_input.is_empty() {
        client.create_room(nickname).await
    } else {
        client.join_room(&code_input, nickname).await
    };
    let doc = match doc {
        Ok(doc) => doc,
        Err(e) => {
            eprintln!("{e}");
            return;
        }
    };
    println!("── Room {} ── you are {}", doc.code, client.identity());
    print_help();

    let watch = spawn_room_poller(store, doc.code.clone(), POLL_INTERVAL);
    let (events_tx, mut events_rx) = mpsc::channel(64);
    tokio::spawn(Driver::new(client.clone(), events_tx).run(watch.subscribe()));

    let mut lines = spawn_stdin_lines();
    let mut current = doc;
    let mut results: Vec<GifEntry> = Vec::new();

    loop {
        tokio::select! {
            event = events_rx.recv() => {
                match event {
                    Some(GameEvent::Updated(doc)) => {
                        print_update(&client, &current, &doc);
                        current = doc;
                    }
                    Some(GameEvent::Kicked) => {
                        println!("You were removed from the room.");
                        return;
                    }
                    None => return,
                }
            }
            line = lines.recv() => {
                let Some(line) = line else { return };
                if !handle_command(&client, &searcher, &llm_config, &current, &mut results, line.trim()).await {
                    return;
                }
            }
        }
    }
}

fn print_help() {
    println!(
        "commands: start · suggest · prompt <text> · kick <player-id> · force · \
         search <query> · pick <n> · vote left|right · next · again · quit"
    );
}

fn print_update(client: &GameClient, previous: &SessionDoc, doc: &SessionDoc) {
    let phase_changed =
        previous.phase != doc.phase || previous.voting_round != doc.voting_round;
    match doc.phase {
        GamePhase::Lobby => {
            let names: Vec<&str> = doc.players.iter().map(|p| p.nickname.as_str()).collect();
            println!("lobby · {} player(s): {}", names.len(), names.join(", "));
        }
        GamePhase::Submitting => {
            if let Some(slot) = state::next_open_slot(doc, client.identity()) {
                println!("submit · \"{}\"", doc.prompts[slot]);
            } else if phase_changed {
                println!("submit · all your prompts answered, waiting for the rest");
            }
        }
        GamePhase::Voting => {
            let pair = &doc.matchups[doc.current_matchup];
            let name = |id: &str| {
                doc.player(id)
                    .map(|p| p.nickname.clone())
                    .unwrap_or_else(|| id.to_string())
            };
            println!(
                "vote · \"{}\" · {} vs {} (matchup {}/{})",
                doc.prompts[doc.voting_round],
                name(&pair[0]),
                name(&pair[1]),
                doc.current_matchup + 1,
                doc.matchups.len()
            );
        }
        GamePhase::RoundResults => {
            if phase_changed {
                println!("round results:");
                print_scoreboard(doc);
            }
        }
        GamePhase::GameOver => {
            if phase_changed {
                println!("game over!");
                print_scoreboard(doc);
            }
        }
    }
}

fn print_scoreboard(doc: &SessionDoc) {
    let mut sorted = doc.players.clone();
    sorted.sort_by(|a, b| b.score.cmp(&a.score));
    for (i, p) in sorted.iter().enumerate() {
        println!("  {}. {} - {} pts", i + 1, p.nickname, p.score);
    }
}

async fn handle_command(
    client: &GameClient,
    searcher: &GifSearcher,
    llm_config: &LlmConfig,
    doc: &SessionDoc,
    results: &mut Vec<GifEntry>,
    line: &str,
) -> bool {
    let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));
    let outcome = match cmd {
        "quit" => {
            client.leave().await;
            return false;
        }
        "start" => client.start_game().await.map(|_| ()),
        "force" => client.force_start_voting().await.map(|_| ()),
        "next" => client.next_voting_round().await.map(|_| ()),
        "again" => client.play_again().await.map(|_| ()),
        "kick" => client.kick_player(rest.trim()).await,
        "prompt" => client.add_custom_prompt(rest).await.map(|_| ()),
        "suggest" => {
            let nicknames: Vec<String> =
                doc.players.iter().map(|p| p.nickname.clone()).collect();
            match llm_config.build_provider() {
                Ok(provider) => match provider.suggest(&nicknames).await {
                    Ok(suggestions) => {
                        for s in &suggestions {
                            println!("  idea: {s}");
                        }
                        Ok(())
                    }
                    Err(SuggestError::InvalidCredential) => {
                        println!("Invalid API key - check and re-enter it");
                        Ok(())
                    }
                    Err(e) => {
                        println!("suggestion failed: {e}");
                        Ok(())
                    }
                },
                Err(SuggestError::NotConfigured) => {
                    println!("No API key set - export ANTHROPIC_API_KEY or OPENAI_API_KEY");
                    Ok(())
                }
                Err(e) => {
                    println!("suggestion failed: {e}");
                    Ok(())
                }
            }
        }
        "search" => {
            *results = searcher.search(rest, 0).await;
            if results.is_empty() {
                println!("No results - try different keywords");
            }
            for (i, gif) in results.iter().enumerate() {
                println!("  [{i}] {}", gif.url);
            }
            Ok(())
        }
        "pick" => match rest.trim().parse::<usize>().ok().and_then(|i| results.get(i)) {
            Some(gif) => client
                .record_submission(gif.url.clone(), gif.preview.clone())
                .await
                .map(|_| ()),
            None => {
                println!("pick <n> selects a search result");
                Ok(())
            }
        },
        "vote" => match VoteSide::parse(rest) {
            Some(side) => client.cast_vote(side).await,
            None => {
                println!("vote left|right");
                Ok(())
            }
        },
        "" => Ok(()),
        _ => {
            print_help();
            Ok(())
        }
    };

    if let Err(e) = outcome {
        println!("{e}");
    }
    true
}
