use crate::domain::error::PersistenceError;
use crate::domain::models::{
    GameId, GameRecord, GameStatus, MatchHistoryEntry, MatchStatus, PlayerId, PlayerRecord,
    Players, Role, parse_move_log,
};
use crate::domain::rating::{INITIAL_RATING, elo_update};
use crate::domain::services::{GameRepository, MATCH_RATING_WINDOW};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{FromRow, Row};
use std::str::FromStr;
use tracing::{debug, info};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS players (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        elo_rating REAL NOT NULL DEFAULT 1200,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE IF NOT EXISTS games (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        white_player_id INTEGER NOT NULL REFERENCES players(id),
        black_player_id INTEGER NOT NULL REFERENCES players(id),
        initial_fen TEXT NOT NULL,
        current_position TEXT NOT NULL,
        moves_history TEXT NOT NULL DEFAULT '',
        status TEXT NOT NULL DEFAULT 'ongoing',
        winner_id INTEGER REFERENCES players(id),
        start_time DATETIME DEFAULT CURRENT_TIMESTAMP,
        end_time DATETIME
    )",
    "CREATE INDEX IF NOT EXISTS games_white ON games(white_player_id)",
    "CREATE INDEX IF NOT EXISTS games_black ON games(black_player_id)",
    "CREATE TABLE IF NOT EXISTS matchmaking_queue (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        player_id INTEGER NOT NULL UNIQUE REFERENCES players(id),
        elo REAL NOT NULL,
        queued_at DATETIME DEFAULT CURRENT_TIMESTAMP
    )",
];

const GAME_COLUMNS: &str = "id, white_player_id, black_player_id, current_position, \
     moves_history, status, winner_id, start_time, end_time";

impl From<sqlx::Error> for PersistenceError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => PersistenceError::NotFound,
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                PersistenceError::Conflict(db.message().to_string())
            }
            other => PersistenceError::Unavailable(other.to_string()),
        }
    }
}

#[derive(FromRow)]
struct GameRow {
    id: i64,
    white_player_id: i64,
    black_player_id: i64,
    current_position: String,
    moves_history: String,
    status: String,
    winner_id: Option<i64>,
    start_time: Option<NaiveDateTime>,
    end_time: Option<NaiveDateTime>,
}

impl TryFrom<GameRow> for GameRecord {
    type Error = PersistenceError;

    fn try_from(row: GameRow) -> Result<Self, Self::Error> {
        let status = GameStatus::from_db_str(&row.status).ok_or_else(|| {
            PersistenceError::Corrupt(format!("game {} has status {:?}", row.id, row.status))
        })?;
        Ok(GameRecord {
            game_id: row.id.to_string(),
            current_position: row.current_position,
            moves_history: parse_move_log(&row.moves_history),
            status,
            players: Players {
                white: row.white_player_id,
                black: row.black_player_id,
            },
            winner_id: row.winner_id,
            started_at: row.start_time,
            ended_at: row.end_time,
        })
    }
}

#[derive(FromRow)]
struct HistoryRow {
    #[sqlx(flatten)]
    game: GameRow,
    white_username: String,
    white_elo: f64,
    black_username: String,
    black_elo: f64,
}

impl TryFrom<HistoryRow> for MatchHistoryEntry {
    type Error = PersistenceError;

    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        let game = GameRecord::try_from(row.game)?;
        Ok(MatchHistoryEntry {
            white: PlayerRecord {
                id: game.players.white,
                username: row.white_username,
                elo_rating: row.white_elo,
            },
            black: PlayerRecord {
                id: game.players.black,
                username: row.black_username,
                elo_rating: row.black_elo,
            },
            game,
        })
    }
}

#[derive(FromRow)]
struct PlayerRow {
    id: i64,
    username: String,
    elo_rating: f64,
}

impl From<PlayerRow> for PlayerRecord {
    fn from(row: PlayerRow) -> Self {
        PlayerRecord {
            id: row.id,
            username: row.username,
            elo_rating: row.elo_rating,
        }
    }
}

/// Game ids are the `games.id` rowid rendered as text.
fn row_id(game_id: &str) -> Option<i64> {
    game_id.trim().parse().ok()
}

/// SQLite-backed repository. Every operation borrows a pooled connection (or
/// a transaction) for exactly its own statements; dropping an uncommitted
/// transaction rolls it back.
#[derive(Clone)]
pub struct SqliteGameRepository {
    pool: SqlitePool,
}

impl SqliteGameRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, PersistenceError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        info!(url, max_connections, "database pool ready");
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn init_schema(&self) -> Result<(), PersistenceError> {
        for statement in SCHEMA {
            sqlx::query(*statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl GameRepository for SqliteGameRepository {
    async fn load_game(&self, game_id: &str) -> Result<Option<GameRecord>, PersistenceError> {
        let Some(id) = row_id(game_id) else {
            return Ok(None);
        };
        let row: Option<GameRow> =
            sqlx::query_as(&format!("SELECT {GAME_COLUMNS} FROM games WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(GameRecord::try_from).transpose()
    }

    async fn record_move(
        &self,
        game_id: &str,
        fen: &str,
        notation: &str,
    ) -> Result<(), PersistenceError> {
        let id = row_id(game_id).ok_or(PersistenceError::NotFound)?;
        let result = sqlx::query(
            "UPDATE games
             SET current_position = ?,
                 moves_history = moves_history || ? || ' '
             WHERE id = ? AND status = 'ongoing'",
        )
        .bind(fen)
        .bind(notation)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::NotFound);
        }
        debug!(game_id, notation, "move recorded");
        Ok(())
    }

    async fn finish_game(
        &self,
        game_id: &str,
        status: GameStatus,
        winner_id: Option<PlayerId>,
    ) -> Result<(), PersistenceError> {
        let id = row_id(game_id).ok_or(PersistenceError::NotFound)?;
        let mut tx = self.pool.begin().await?;

        let players = sqlx::query("SELECT white_player_id, black_player_id FROM games WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(PersistenceError::NotFound)?;
        let white: i64 = players.try_get("white_player_id")?;
        let black: i64 = players.try_get("black_player_id")?;

        let flipped = sqlx::query(
            "UPDATE games
             SET status = ?, winner_id = ?, end_time = CURRENT_TIMESTAMP
             WHERE id = ? AND status = 'ongoing'",
        )
        .bind(status.as_db_str())
        .bind(winner_id)
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if flipped == 0 {
            debug!(game_id, "game already finished");
            tx.commit().await?;
            return Ok(());
        }

        if let (GameStatus::Completed, Some(winner)) = (status, winner_id) {
            let loser = if winner == white { black } else { white };
            let rating = |player: i64| {
                sqlx::query_scalar::<sqlx::Sqlite, f64>("SELECT elo_rating FROM players WHERE id = ?")
                    .bind(player)
            };
            let winner_elo = rating(winner)
                .fetch_optional(&mut *tx)
                .await?
                .unwrap_or(INITIAL_RATING);
            let loser_elo = rating(loser)
                .fetch_optional(&mut *tx)
                .await?
                .unwrap_or(INITIAL_RATING);
            let (new_winner, new_loser) = elo_update(winner_elo, loser_elo);

            for (player, elo) in [(winner, new_winner), (loser, new_loser)] {
                sqlx::query("UPDATE players SET elo_rating = ? WHERE id = ?")
                    .bind(elo)
                    .bind(player)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;
        info!(game_id, status = status.as_db_str(), ?winner_id, "game finished");
        Ok(())
    }

    async fn create_player(&self, username: &str) -> Result<PlayerRecord, PersistenceError> {
        let id = sqlx::query("INSERT INTO players (username, elo_rating) VALUES (?, ?)")
            .bind(username)
            .bind(INITIAL_RATING)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();
        Ok(PlayerRecord {
            id,
            username: username.to_string(),
            elo_rating: INITIAL_RATING,
        })
    }

    async fn load_player(
        &self,
        player_id: PlayerId,
    ) -> Result<Option<PlayerRecord>, PersistenceError> {
        let row: Option<PlayerRow> =
            sqlx::query_as("SELECT id, username, elo_rating FROM players WHERE id = ?")
                .bind(player_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(PlayerRecord::from))
    }

    async fn create_game(
        &self,
        white: PlayerId,
        black: PlayerId,
        initial_fen: &str,
    ) -> Result<GameId, PersistenceError> {
        let mut tx = self.pool.begin().await?;
        let known: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM players WHERE id IN (?, ?)")
            .bind(white)
            .bind(black)
            .fetch_one(&mut *tx)
            .await?;
        let expected = if white == black { 1 } else { 2 };
        if known != expected {
            return Err(PersistenceError::NotFound);
        }

        let id = sqlx::query(
            "INSERT INTO games (white_player_id, black_player_id, initial_fen, current_position)
             VALUES (?, ?, ?, ?)",
        )
        .bind(white)
        .bind(black)
        .bind(initial_fen)
        .bind(initial_fen)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();
        tx.commit().await?;

        info!(game_id = id, white, black, "game created");
        Ok(id.to_string())
    }

    async fn match_history(
        &self,
        player_id: PlayerId,
        limit: usize,
    ) -> Result<Vec<MatchHistoryEntry>, PersistenceError> {
        let rows: Vec<HistoryRow> = sqlx::query_as(
            "SELECT g.id, g.white_player_id, g.black_player_id, g.current_position,
                    g.moves_history, g.status, g.winner_id, g.start_time, g.end_time,
                    w.username AS white_username, w.elo_rating AS white_elo,
                    b.username AS black_username, b.elo_rating AS black_elo
             FROM games g
             JOIN players w ON w.id = g.white_player_id
             JOIN players b ON b.id = g.black_player_id
             WHERE g.white_player_id = ? OR g.black_player_id = ?
             ORDER BY g.start_time DESC, g.id DESC
             LIMIT ?",
        )
        .bind(player_id)
        .bind(player_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(MatchHistoryEntry::try_from).collect()
    }

    async fn join_queue(&self, player_id: PlayerId) -> Result<(), PersistenceError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM matchmaking_queue WHERE player_id = ?")
            .bind(player_id)
            .execute(&mut *tx)
            .await?;
        let queued = sqlx::query(
            "INSERT INTO matchmaking_queue (player_id, elo)
             SELECT id, elo_rating FROM players WHERE id = ?",
        )
        .bind(player_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if queued == 0 {
            return Err(PersistenceError::NotFound);
        }
        tx.commit().await?;
        debug!(player_id, "player queued");
        Ok(())
    }

    async fn leave_queue(&self, player_id: PlayerId) -> Result<(), PersistenceError> {
        sqlx::query("DELETE FROM matchmaking_queue WHERE player_id = ?")
            .bind(player_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn check_match(
        &self,
        player_id: PlayerId,
        initial_fen: &str,
        requester_is_white: bool,
    ) -> Result<MatchStatus, PersistenceError> {
        let mut tx = self.pool.begin().await?;
        let player = |id: PlayerId| {
            sqlx::query_as::<sqlx::Sqlite, PlayerRow>(
                "SELECT id, username, elo_rating FROM players WHERE id = ?",
            )
            .bind(id)
        };
        player(player_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(PersistenceError::NotFound)?;

        let ongoing: Option<GameRow> = sqlx::query_as(&format!(
            "SELECT {GAME_COLUMNS} FROM games
             WHERE (white_player_id = ? OR black_player_id = ?) AND status = 'ongoing'
             ORDER BY id DESC
             LIMIT 1"
        ))
        .bind(player_id)
        .bind(player_id)
        .fetch_optional(&mut *tx)
        .await?;
        if let Some(row) = ongoing {
            let game = GameRecord::try_from(row)?;
            let role = game
                .players
                .role_of(player_id)
                .ok_or(PersistenceError::NotFound)?;
            let opponent = player(game.players.id_for(role.opponent()))
                .fetch_one(&mut *tx)
                .await?;
            return Ok(MatchStatus::Matched {
                game_id: game.game_id,
                opponent: opponent.into(),
                is_white: role == Role::White,
                fen: game.current_position,
            });
        }

        let mine: Option<f64> =
            sqlx::query_scalar("SELECT elo FROM matchmaking_queue WHERE player_id = ?")
                .bind(player_id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(elo) = mine else {
            return Ok(MatchStatus::Searching);
        };
        let candidate: Option<i64> = sqlx::query_scalar(
            "SELECT player_id FROM matchmaking_queue
             WHERE player_id != ? AND ABS(elo - ?) <= ?
             ORDER BY id ASC
             LIMIT 1",
        )
        .bind(player_id)
        .bind(elo)
        .bind(MATCH_RATING_WINDOW)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(opponent_id) = candidate else {
            return Ok(MatchStatus::Searching);
        };

        // Another poll may have claimed either entry first.
        let claimed = sqlx::query("DELETE FROM matchmaking_queue WHERE player_id IN (?, ?)")
            .bind(player_id)
            .bind(opponent_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if claimed != 2 {
            return Ok(MatchStatus::Searching);
        }

        let (white, black) = if requester_is_white {
            (player_id, opponent_id)
        } else {
            (opponent_id, player_id)
        };
        let game_id = sqlx::query(
            "INSERT INTO games (white_player_id, black_player_id, initial_fen, current_position)
             VALUES (?, ?, ?, ?)",
        )
        .bind(white)
        .bind(black)
        .bind(initial_fen)
        .bind(initial_fen)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();
        let opponent = player(opponent_id).fetch_one(&mut *tx).await?;
        tx.commit().await?;

        info!(game_id, white, black, "players paired");
        Ok(MatchStatus::Matched {
            game_id: game_id.to_string(),
            opponent: opponent.into(),
            is_white: requester_is_white,
            fen: initial_fen.to_string(),
        })
    }
}
