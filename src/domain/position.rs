use crate::domain::models::Role;
use chess::{ALL_SQUARES, Board, BoardBuilder, ChessMove, Color, Piece};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid FEN {fen:?}: {reason}")]
pub struct FenError {
    pub fen: String,
    pub reason: String,
}

/// A chess position with the move counters FEN carries.
///
/// `chess::Board` only knows piece placement, side to move, castling rights
/// and en passant, so the halfmove clock, the fullmove number and the hashes
/// of positions since the last pawn move or capture are tracked here.
#[derive(Clone, Debug)]
pub struct Position {
    board: Board,
    halfmove_clock: u32,
    fullmove_number: u32,
    // Includes the current position as the last entry.
    repetitions: Vec<u64>,
}

impl Position {
    pub fn from_fen(fen: &str) -> Result<Self, FenError> {
        let fen = fen.trim();
        let fields: Vec<&str> = fen.split_whitespace().collect();
        let invalid = |reason: &str| FenError {
            fen: fen.to_string(),
            reason: reason.to_string(),
        };

        if fields.len() != 4 && fields.len() != 6 {
            return Err(invalid("expected 4 or 6 fields"));
        }

        let (halfmove_clock, fullmove_number) = if fields.len() == 6 {
            let halfmove = fields[4]
                .parse::<u32>()
                .map_err(|_| invalid("bad halfmove clock"))?;
            let fullmove = fields[5]
                .parse::<u32>()
                .map_err(|_| invalid("bad fullmove number"))?;
            if fullmove == 0 {
                return Err(invalid("fullmove number starts at 1"));
            }
            (halfmove, fullmove)
        } else {
            (0, 1)
        };

        // Board construction indexes attack tables by king square, which is
        // out of range when a side has no king.
        let builder = BoardBuilder::from_str(&fields[..4].join(" "))
            .map_err(|e| invalid(&e.to_string()))?;
        for color in [Color::White, Color::Black] {
            let kings = ALL_SQUARES
                .iter()
                .filter(|&&sq| builder[sq] == Some((Piece::King, color)))
                .count();
            if kings != 1 {
                return Err(invalid("each side needs exactly one king"));
            }
        }
        let board = Board::try_from(&builder).map_err(|e| invalid(&e.to_string()))?;

        Ok(Self {
            board,
            halfmove_clock,
            fullmove_number,
            repetitions: vec![board.get_hash()],
        })
    }

    pub fn to_fen(&self) -> String {
        // Board's Display is a FEN whose counters are always "0 1".
        let rendered = self.board.to_string();
        let placement: Vec<&str> = rendered.split_whitespace().take(4).collect();
        format!(
            "{} {} {}",
            placement.join(" "),
            self.halfmove_clock,
            self.fullmove_number
        )
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn side_to_move(&self) -> Role {
        self.board.side_to_move().into()
    }

    pub fn is_white_turn(&self) -> bool {
        self.side_to_move() == Role::White
    }

    pub fn is_check(&self) -> bool {
        self.board.checkers().popcnt() > 0
    }

    pub fn halfmove_clock(&self) -> u32 {
        self.halfmove_clock
    }

    pub fn fullmove_number(&self) -> u32 {
        self.fullmove_number
    }

    /// How often the current position occurred since the last irreversible move.
    pub fn repetition_count(&self) -> usize {
        let current = self.board.get_hash();
        self.repetitions.iter().filter(|&&h| h == current).count()
    }

    /// Plays an already validated move.
    pub(crate) fn play(&self, mv: ChessMove) -> Self {
        let irreversible = self.board.piece_on(mv.get_source()) == Some(Piece::Pawn)
            || self.board.piece_on(mv.get_dest()).is_some();
        let black_moved = self.side_to_move() == Role::Black;

        let board = self.board.make_move_new(mv);
        let mut repetitions = if irreversible {
            Vec::new()
        } else {
            self.repetitions.clone()
        };
        repetitions.push(board.get_hash());

        Self {
            board,
            halfmove_clock: if irreversible {
                0
            } else {
                self.halfmove_clock + 1
            },
            fullmove_number: self.fullmove_number + u32::from(black_moved),
            repetitions,
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        let board = Board::default();
        Self {
            board,
            halfmove_clock: 0,
            fullmove_number: 1,
            repetitions: vec![board.get_hash()],
        }
    }
}

impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        self.board == other.board
            && self.halfmove_clock == other.halfmove_clock
            && self.fullmove_number == other.fullmove_number
    }
}

impl Eq for Position {}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_fen())
    }
}

impl FromStr for Position {
    type Err = FenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_fen(s)
    }
}

pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

#[cfg(test)]
mod tests {
    use super::*;
    use chess::Square;

    #[test]
    fn default_is_the_standard_start() {
        let position = Position::default();
        assert_eq!(position.to_fen(), START_FEN);
        assert!(position.is_white_turn());
        assert_eq!(position, Position::from_fen(START_FEN).unwrap());
    }

    #[test]
    fn four_field_fen_defaults_counters() {
        let position =
            Position::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq -").unwrap();
        assert_eq!(position.halfmove_clock(), 0);
        assert_eq!(position.fullmove_number(), 1);
    }

    #[test]
    fn counters_survive_text_form() {
        let fen = "4k3/8/8/8/8/8/8/4K2R w K - 37 52";
        let position = Position::from_fen(fen).unwrap();
        assert_eq!(position.halfmove_clock(), 37);
        assert_eq!(position.fullmove_number(), 52);
        assert_eq!(position.to_fen(), fen);
    }

    #[test]
    fn rejects_garbage() {
        assert!(Position::from_fen("").is_err());
        assert!(Position::from_fen("not a fen at all").is_err());
        assert!(Position::from_fen("8/8/8/8/8/8/8/8 w - - x 1").is_err());
    }

    #[test]
    fn boards_without_one_king_per_side_are_rejected() {
        let empty = Position::from_fen("8/8/8/8/8/8/8/8 w - - 0 1").unwrap_err();
        assert_eq!(empty.reason, "each side needs exactly one king");
        assert!(Position::from_fen("4k3/8/8/8/8/8/8/8 w - - 0 1").is_err());
        assert!(Position::from_fen("4k3/8/8/8/8/8/8/K3K3 w - - 0 1").is_err());
        assert!(Position::from_fen("4k3/8/8/8/8/8/8/4K3 w - - 0 1").is_ok());
    }

    #[test]
    fn pawn_move_resets_clock_and_black_move_bumps_fullmove() {
        let start = Position::default();
        let after_e4 = start.play(ChessMove::new(Square::E2, Square::E4, None));
        assert_eq!(after_e4.halfmove_clock(), 0);
        assert_eq!(after_e4.fullmove_number(), 1);
        assert!(!after_e4.is_white_turn());

        let after_nf6 = after_e4.play(ChessMove::new(Square::G8, Square::F6, None));
        assert_eq!(after_nf6.halfmove_clock(), 1);
        assert_eq!(after_nf6.fullmove_number(), 2);
    }

    #[test]
    fn knight_shuffle_repeats_the_start() {
        let shuffle = [
            (Square::G1, Square::F3),
            (Square::G8, Square::F6),
            (Square::F3, Square::G1),
            (Square::F6, Square::G8),
        ];
        let mut position = Position::default();
        for (from, to) in shuffle {
            position = position.play(ChessMove::new(from, to, None));
        }
        assert_eq!(position.repetition_count(), 2);
        assert_eq!(position.halfmove_clock(), 4);
    }
}
