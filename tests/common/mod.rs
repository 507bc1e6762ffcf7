#![allow(dead_code)]

use chessroom::application::broadcast::EventReceiver;
use chessroom::application::game_service::{GameService, SessionSettings};
use chessroom::domain::events::GameEvent;
use chessroom::domain::models::{GameId, GameRecord, PlayerRecord};
use chessroom::domain::position::START_FEN;
use chessroom::domain::services::GameRepository;
use chessroom::infrastructure::memory::MemoryGameRepository;
use std::sync::Arc;

pub struct Table {
    pub service: Arc<GameService>,
    pub repo: Arc<MemoryGameRepository>,
    pub game_id: GameId,
    pub white: PlayerRecord,
    pub black: PlayerRecord,
}

impl Table {
    pub async fn record(&self, game_id: &str) -> GameRecord {
        self.repo.load_game(game_id).await.unwrap().unwrap()
    }

    /// Registers another stored game between the same two players.
    pub async fn new_game(&self, fen: &str) -> GameId {
        self.repo
            .create_game(self.white.id, self.black.id, fen)
            .await
            .unwrap()
    }
}

pub async fn table() -> Table {
    table_with(SessionSettings::default(), START_FEN).await
}

pub async fn table_from(fen: &str) -> Table {
    table_with(SessionSettings::default(), fen).await
}

pub async fn table_with(settings: SessionSettings, fen: &str) -> Table {
    let repo = Arc::new(MemoryGameRepository::new());
    let white = repo.create_player("alice").await.unwrap();
    let black = repo.create_player("bob").await.unwrap();
    let game_id = repo.create_game(white.id, black.id, fen).await.unwrap();

    let dyn_repo: Arc<dyn GameRepository> = repo.clone();
    let service = Arc::new(GameService::new(dyn_repo, settings));

    Table {
        service,
        repo,
        game_id,
        white,
        black,
    }
}

/// Everything queued for a connection so far.
pub fn drain(rx: &mut EventReceiver) -> Vec<GameEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn moves_seen(events: &[GameEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            GameEvent::MoveMade { notation, .. } => Some(notation.clone()),
            _ => None,
        })
        .collect()
}

pub fn game_overs(events: &[GameEvent]) -> usize {
    events
        .iter()
        .filter(|event| matches!(event, GameEvent::GameOver { .. }))
        .count()
}
