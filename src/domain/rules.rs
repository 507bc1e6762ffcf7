//! Rules oracle: legality, the resulting position and terminal classification.
//!
//! Everything here is a pure function of the position passed in, so sessions
//! call into it concurrently without coordination.

use crate::domain::error::InvalidMove;
use crate::domain::models::TerminalKind;
use crate::domain::position::Position;
use chess::{BoardStatus, ChessMove, Color, File, MoveGen, Piece, Rank, Square};
use smallvec::SmallVec;

/// Halfmoves without a pawn move or capture that end the game.
pub const SEVENTY_FIVE_MOVE_PLIES: u32 = 150;
pub const FIVEFOLD: usize = 5;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppliedMove {
    pub notation: String,
    pub position: Position,
    pub is_check: bool,
    pub terminal: Option<TerminalKind>,
}

pub struct Rules;

impl Rules {
    /// Validates `notation` (UCI, e.g. `e2e4`, `e7e8q`) against `position` and
    /// returns the resulting position with its classification.
    pub fn try_apply_move(position: &Position, notation: &str) -> Result<AppliedMove, InvalidMove> {
        let mv = parse_uci(notation)?;

        if !MoveGen::new_legal(position.board()).any(|legal| legal == mv) {
            return Err(InvalidMove::NotLegalHere(notation.to_string()));
        }

        let next = position.play(mv);
        Ok(AppliedMove {
            notation: format_uci(mv),
            is_check: next.is_check(),
            terminal: Self::classify(&next),
            position: next,
        })
    }

    /// Legal moves in `position`, optionally restricted to those leaving `from`.
    /// Sorted by source square, destination square, then promotion piece.
    pub fn legal_moves_from(position: &Position, from: Option<Square>) -> Vec<String> {
        let mut moves: SmallVec<[ChessMove; 64]> = MoveGen::new_legal(position.board())
            .filter(|mv| from.is_none_or(|sq| mv.get_source() == sq))
            .collect();
        moves.sort_by_key(|mv| {
            (
                mv.get_source().to_index(),
                mv.get_dest().to_index(),
                mv.get_promotion().map(|p| p.to_index()),
            )
        });
        moves.into_iter().map(format_uci).collect()
    }

    pub fn parse_square(text: &str) -> Option<Square> {
        match text.trim().as_bytes() {
            &[file, rank] => {
                let file = file.to_ascii_lowercase();
                if !(b'a'..=b'h').contains(&file) || !(b'1'..=b'8').contains(&rank) {
                    return None;
                }
                Some(Square::make_square(
                    Rank::from_index(usize::from(rank - b'1')),
                    File::from_index(usize::from(file - b'a')),
                ))
            }
            _ => None,
        }
    }

    pub fn classify(position: &Position) -> Option<TerminalKind> {
        match position.board().status() {
            BoardStatus::Checkmate => return Some(TerminalKind::Checkmate),
            BoardStatus::Stalemate => return Some(TerminalKind::Stalemate),
            BoardStatus::Ongoing => {}
        }
        if has_insufficient_material(position) {
            Some(TerminalKind::InsufficientMaterial)
        } else if position.halfmove_clock() >= SEVENTY_FIVE_MOVE_PLIES {
            Some(TerminalKind::SeventyFiveMoveRule)
        } else if position.repetition_count() >= FIVEFOLD {
            Some(TerminalKind::FivefoldRepetition)
        } else {
            None
        }
    }
}

fn parse_uci(notation: &str) -> Result<ChessMove, InvalidMove> {
    let malformed = || InvalidMove::Malformed(notation.to_string());
    let text = notation.trim();
    if !text.is_ascii() || !(4..=5).contains(&text.len()) {
        return Err(malformed());
    }

    let source = Rules::parse_square(&text[0..2]).ok_or_else(malformed)?;
    let dest = Rules::parse_square(&text[2..4]).ok_or_else(malformed)?;
    let promotion = match text.as_bytes().get(4).map(u8::to_ascii_lowercase) {
        None => None,
        Some(b'q') => Some(Piece::Queen),
        Some(b'r') => Some(Piece::Rook),
        Some(b'b') => Some(Piece::Bishop),
        Some(b'n') => Some(Piece::Knight),
        Some(_) => return Err(malformed()),
    };
    if source == dest {
        return Err(malformed());
    }

    Ok(ChessMove::new(source, dest, promotion))
}

fn format_uci(mv: ChessMove) -> String {
    let promotion = match mv.get_promotion() {
        Some(Piece::Queen) => "q",
        Some(Piece::Rook) => "r",
        Some(Piece::Bishop) => "b",
        Some(Piece::Knight) => "n",
        _ => "",
    };
    format!("{}{}{}", mv.get_source(), mv.get_dest(), promotion)
}

/// Neither side can mate: no pawns, rooks or queens, and either at most one
/// minor piece on the board or only bishops that all stand on one colour.
fn has_insufficient_material(position: &Position) -> bool {
    let board = position.board();
    let heavy = board.pieces(Piece::Pawn).popcnt()
        + board.pieces(Piece::Rook).popcnt()
        + board.pieces(Piece::Queen).popcnt();
    if heavy > 0 {
        return false;
    }

    let knights = board.pieces(Piece::Knight).popcnt();
    let bishops = *board.pieces(Piece::Bishop);
    if knights + bishops.popcnt() <= 1 {
        return true;
    }
    if knights > 0 {
        return false;
    }

    let mut colours = bishops.map(square_colour);
    match colours.next() {
        Some(first) => colours.all(|c| c == first),
        None => true,
    }
}

fn square_colour(square: Square) -> Color {
    if (square.get_rank().to_index() + square.get_file().to_index()) % 2 == 0 {
        Color::Black
    } else {
        Color::White
    }
}
