use chessroom::application::game_service::{Durability, GameService, SessionSettings};
use chessroom::domain::error::PersistenceError;
use chessroom::domain::models::{GameStatus, MatchStatus, Players, Role};
use chessroom::domain::position::START_FEN;
use chessroom::domain::services::GameRepository;
use chessroom::infrastructure::persistence::SqliteGameRepository;
use std::sync::Arc;
use uuid::Uuid;

async fn test_repo() -> SqliteGameRepository {
    let repo = SqliteGameRepository::connect("sqlite::memory:", 1)
        .await
        .expect("Failed to create test database");
    repo.init_schema().await.expect("Failed to create schema");
    repo
}

#[tokio::test]
async fn schema_creation_is_repeatable() {
    let repo = test_repo().await;
    repo.init_schema().await.unwrap();
}

#[tokio::test]
async fn moves_are_appended_to_the_stored_log() {
    let repo = test_repo().await;
    let white = repo.create_player("alice").await.unwrap();
    let black = repo.create_player("bob").await.unwrap();
    let game_id = repo.create_game(white.id, black.id, START_FEN).await.unwrap();

    let fresh = repo.load_game(&game_id).await.unwrap().unwrap();
    assert_eq!(fresh.status, GameStatus::Active);
    assert_eq!(fresh.current_position, START_FEN);
    assert!(fresh.moves_history.is_empty());
    assert!(fresh.started_at.is_some());
    assert_eq!(fresh.players.white, white.id);
    assert_eq!(fresh.players.black, black.id);

    repo.record_move(&game_id, "fen-after-e4", "e2e4").await.unwrap();
    repo.record_move(&game_id, "fen-after-e5", "e7e5").await.unwrap();

    let record = repo.load_game(&game_id).await.unwrap().unwrap();
    assert_eq!(record.moves_history, vec!["e2e4", "e7e5"]);
    assert_eq!(record.current_position, "fen-after-e5");
}

#[tokio::test]
async fn unknown_and_malformed_ids() {
    let repo = test_repo().await;
    assert_eq!(repo.load_game("42").await.unwrap(), None);
    assert_eq!(repo.load_game("not-a-number").await.unwrap(), None);
    assert_eq!(repo.load_player(42).await.unwrap(), None);
    assert_eq!(
        repo.record_move("42", "fen", "e2e4").await,
        Err(PersistenceError::NotFound)
    );
    assert_eq!(
        repo.create_game(1, 2, START_FEN).await,
        Err(PersistenceError::NotFound)
    );
}

#[tokio::test]
async fn usernames_are_unique() {
    let repo = test_repo().await;
    let first = repo.create_player("carol").await.unwrap();
    assert_eq!(first.elo_rating, 1200.0);
    assert!(matches!(
        repo.create_player("carol").await,
        Err(PersistenceError::Conflict(_))
    ));
}

#[tokio::test]
async fn finishing_updates_ratings_once() {
    let repo = test_repo().await;
    let white = repo.create_player("alice").await.unwrap();
    let black = repo.create_player("bob").await.unwrap();
    let game_id = repo.create_game(white.id, black.id, START_FEN).await.unwrap();

    repo.finish_game(&game_id, GameStatus::Completed, Some(white.id))
        .await
        .unwrap();
    repo.finish_game(&game_id, GameStatus::Completed, Some(black.id))
        .await
        .unwrap();

    let record = repo.load_game(&game_id).await.unwrap().unwrap();
    assert_eq!(record.status, GameStatus::Completed);
    assert_eq!(record.winner_id, Some(white.id));
    assert!(record.ended_at.is_some());

    let winner = repo.load_player(white.id).await.unwrap().unwrap();
    let loser = repo.load_player(black.id).await.unwrap().unwrap();
    assert!((winner.elo_rating - 1216.0).abs() < 1e-9);
    assert!((loser.elo_rating - 1184.0).abs() < 1e-9);

    assert_eq!(
        repo.record_move(&game_id, "fen", "a2a3").await,
        Err(PersistenceError::NotFound)
    );
}

#[tokio::test]
async fn draws_leave_ratings_alone() {
    let repo = test_repo().await;
    let white = repo.create_player("alice").await.unwrap();
    let black = repo.create_player("bob").await.unwrap();
    let game_id = repo.create_game(white.id, black.id, START_FEN).await.unwrap();

    repo.finish_game(&game_id, GameStatus::Draw, None).await.unwrap();

    let record = repo.load_game(&game_id).await.unwrap().unwrap();
    assert_eq!(record.status, GameStatus::Draw);
    assert_eq!(record.winner_id, None);
    let white = repo.load_player(white.id).await.unwrap().unwrap();
    assert_eq!(white.elo_rating, 1200.0);
}

#[tokio::test]
async fn match_history_is_newest_first_and_limited() {
    let repo = test_repo().await;
    let alice = repo.create_player("alice").await.unwrap();
    let bob = repo.create_player("bob").await.unwrap();
    let carol = repo.create_player("carol").await.unwrap();

    let mut alice_games = Vec::new();
    for i in 0..4 {
        let (white, black) = if i % 2 == 0 { (alice.id, bob.id) } else { (carol.id, alice.id) };
        alice_games.push(repo.create_game(white, black, START_FEN).await.unwrap());
    }
    repo.create_game(bob.id, carol.id, START_FEN).await.unwrap();

    let history = repo.match_history(alice.id, 50).await.unwrap();
    let ids: Vec<_> = history.iter().map(|g| g.game.game_id.clone()).collect();
    alice_games.reverse();
    assert_eq!(ids, alice_games);
    assert_eq!(history[0].white.username, "carol");
    assert_eq!(history[0].black.username, "alice");
    assert_eq!(history[1].white.username, "alice");
    assert_eq!(history[1].black.elo_rating, 1200.0);

    assert_eq!(repo.match_history(alice.id, 2).await.unwrap().len(), 2);
    assert!(repo.match_history(999, 50).await.unwrap().is_empty());
}

#[tokio::test]
async fn a_session_over_sqlite_round_trips() {
    let repo = Arc::new(test_repo().await);
    let white = repo.create_player("alice").await.unwrap();
    let black = repo.create_player("bob").await.unwrap();
    let game_id = repo.create_game(white.id, black.id, START_FEN).await.unwrap();

    let service = GameService::new(repo.clone(), SessionSettings::default());
    let w = Uuid::new_v4();
    let b = Uuid::new_v4();
    service.connect(w);
    service.connect(b);
    service.join(&game_id, w, Role::White).await.unwrap();
    service.join(&game_id, b, Role::Black).await.unwrap();

    for (conn, mv) in [(w, "f2f3"), (b, "e7e5"), (w, "g2g4")] {
        let receipt = service.submit_move(conn, mv).await.unwrap();
        assert_eq!(receipt.durability, Durability::Recorded);
    }
    let mate = service.submit_move(b, "d8h4").await.unwrap();
    assert_eq!(mate.game_over.unwrap().winner_id, Some(black.id));

    let record = repo.load_game(&game_id).await.unwrap().unwrap();
    assert_eq!(record.status, GameStatus::Completed);
    assert_eq!(record.winner_id, Some(black.id));
    assert_eq!(record.moves_history, vec!["f2f3", "e7e5", "g2g4", "d8h4"]);
    assert_eq!(record.current_position, mate.fen);

    let winner = repo.load_player(black.id).await.unwrap().unwrap();
    assert!((winner.elo_rating - 1216.0).abs() < 1e-9);
}

#[tokio::test]
async fn queued_players_are_paired_once() {
    let repo = test_repo().await;
    let alice = repo.create_player("alice").await.unwrap();
    let bob = repo.create_player("bob").await.unwrap();
    let carol = repo.create_player("carol").await.unwrap();

    repo.join_queue(alice.id).await.unwrap();
    assert_eq!(
        repo.check_match(alice.id, START_FEN, true).await.unwrap(),
        MatchStatus::Searching
    );
    repo.join_queue(bob.id).await.unwrap();
    repo.join_queue(carol.id).await.unwrap();
    // Re-queueing moves alice behind bob.
    repo.join_queue(alice.id).await.unwrap();

    let MatchStatus::Matched {
        game_id,
        opponent,
        is_white,
        fen,
    } = repo.check_match(carol.id, START_FEN, true).await.unwrap()
    else {
        panic!("carol should have been paired");
    };
    assert_eq!(opponent.username, "bob");
    assert!(is_white);
    assert_eq!(fen, START_FEN);

    let record = repo.load_game(&game_id).await.unwrap().unwrap();
    assert_eq!(record.players, Players { white: carol.id, black: bob.id });
    assert_eq!(record.status, GameStatus::Active);

    assert!(matches!(
        repo.check_match(bob.id, START_FEN, true).await.unwrap(),
        MatchStatus::Matched { game_id: ref id, is_white: false, .. } if *id == game_id
    ));
    assert_eq!(
        repo.check_match(alice.id, START_FEN, true).await.unwrap(),
        MatchStatus::Searching
    );

    repo.leave_queue(alice.id).await.unwrap();
    let dave = repo.create_player("dave").await.unwrap();
    repo.join_queue(dave.id).await.unwrap();
    assert_eq!(
        repo.check_match(dave.id, START_FEN, true).await.unwrap(),
        MatchStatus::Searching
    );
}

#[tokio::test]
async fn pairing_stays_within_the_rating_window() {
    let repo = test_repo().await;
    let white = repo.create_player("alice").await.unwrap();
    let black = repo.create_player("bob").await.unwrap();
    let game_id = repo.create_game(white.id, black.id, START_FEN).await.unwrap();
    repo.finish_game(&game_id, GameStatus::Completed, Some(white.id))
        .await
        .unwrap();
    for _ in 0..3 {
        let rematch = repo.create_game(white.id, black.id, START_FEN).await.unwrap();
        repo.finish_game(&rematch, GameStatus::Completed, Some(white.id))
            .await
            .unwrap();
    }
    let winner = repo.load_player(white.id).await.unwrap().unwrap();
    let loser = repo.load_player(black.id).await.unwrap().unwrap();
    assert!(winner.elo_rating - loser.elo_rating > 100.0);

    repo.join_queue(white.id).await.unwrap();
    repo.join_queue(black.id).await.unwrap();
    assert_eq!(
        repo.check_match(black.id, START_FEN, false).await.unwrap(),
        MatchStatus::Searching
    );
    assert_eq!(
        repo.join_queue(404).await,
        Err(PersistenceError::NotFound)
    );
    assert_eq!(
        repo.check_match(404, START_FEN, true).await,
        Err(PersistenceError::NotFound)
    );
}
