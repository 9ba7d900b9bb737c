//! Rules engine contract consumed by the search, and its `chess`-crate backed position.
//!
//! Legality, check and mate detection come from the `chess` crate; this module adds
//! the pieces a game needs on top of a bare `Board`: an undo history, halfmove and
//! fullmove counters, and the draw rules (insufficient material, threefold
//! repetition, fifty-move rule).

use crate::errors::{EngineError, Result};
use crate::notation;
use chess::{Board, BoardStatus, ChessMove, Color, MoveGen, Piece, Square};
use std::ops::{Deref, DerefMut};
use std::str::FromStr;

/// Standard starting position
pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Interface between the search core and whatever owns the chess rules.
///
/// `apply_move` and `undo` mutate the position in place; `undo` must be an exact
/// inverse of the most recent `apply_move`.
pub trait RulesEngine {
    /// All legal moves for the side to move, in a stable enumeration order
    fn legal_moves(&self) -> Vec<ChessMove>;

    /// Legal moves starting on `square` (used for UI hints, never by the search)
    fn legal_moves_from(&self, square: Square) -> Vec<ChessMove> {
        self.legal_moves()
            .into_iter()
            .filter(|mv| mv.get_source() == square)
            .collect()
    }

    fn apply_move(&mut self, mv: ChessMove) -> Result<AppliedMove>;

    fn undo(&mut self) -> Result<AppliedMove>;

    fn side_to_move(&self) -> Color;

    fn piece_on(&self, square: Square) -> Option<(Piece, Color)>;

    /// Read-only view of the current board
    fn board(&self) -> &Board;

    fn is_checkmate(&self) -> bool;

    /// Stalemate or any other game-ending draw condition
    fn is_draw(&self) -> bool;

    /// Whether the side to move is in check
    fn in_check(&self) -> bool;

    fn is_terminal(&self) -> bool {
        self.is_checkmate() || self.is_draw()
    }
}

/// Description of a move that was applied to a position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedMove {
    pub chess_move: ChessMove,
    pub piece: Piece,
    pub color: Color,
    pub captured: Option<Piece>,
    pub promotion: Option<Piece>,
}

/// Why a game ended in a draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawReason {
    Stalemate,
    InsufficientMaterial,
    ThreefoldRepetition,
    FiftyMoveRule,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct HistoryEntry {
    board_before: Board,
    halfmove_clock_before: u32,
    fullmove_number_before: u32,
    applied: AppliedMove,
}

/// Mutable game position with full undo history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChessGame {
    board: Board,
    halfmove_clock: u32,
    fullmove_number: u32,
    history: Vec<HistoryEntry>,
}

impl Default for ChessGame {
    fn default() -> Self {
        Self::new()
    }
}

impl ChessGame {
    /// Create a game at the standard starting position
    pub fn new() -> Self {
        Self {
            board: Board::default(),
            halfmove_clock: 0,
            fullmove_number: 1,
            history: Vec::new(),
        }
    }

    /// Create a game from FEN; missing move counters default to `0 1`
    pub fn from_fen(fen: &str) -> Result<Self> {
        let board = Board::from_str(fen.trim())
            .map_err(|e| EngineError::InvalidPosition(format!("{fen}: {e}")))?;

        let fields: Vec<&str> = fen.split_whitespace().collect();
        let halfmove_clock = match fields.get(4) {
            Some(text) => text.parse::<u32>().map_err(|_| {
                EngineError::InvalidPosition(format!("{fen}: bad halfmove clock '{text}'"))
            })?,
            None => 0,
        };
        let fullmove_number = match fields.get(5) {
            Some(text) => text.parse::<u32>().map_err(|_| {
                EngineError::InvalidPosition(format!("{fen}: bad fullmove number '{text}'"))
            })?,
            None => 1,
        };

        Ok(Self {
            board,
            halfmove_clock,
            fullmove_number: fullmove_number.max(1),
            history: Vec::new(),
        })
    }

    /// Current position as FEN, including move counters
    pub fn fen(&self) -> String {
        let board_fen = self.board.to_string();
        let placement: Vec<&str> = board_fen.split_whitespace().take(4).collect();
        format!(
            "{} {} {}",
            placement.join(" "),
            self.halfmove_clock,
            self.fullmove_number
        )
    }

    pub fn halfmove_clock(&self) -> u32 {
        self.halfmove_clock
    }

    pub fn fullmove_number(&self) -> u32 {
        self.fullmove_number
    }

    /// Number of moves applied since the game was created
    pub fn ply_count(&self) -> usize {
        self.history.len()
    }

    /// Moves applied so far, oldest first
    pub fn applied_moves(&self) -> impl Iterator<Item = &AppliedMove> + '_ {
        self.history.iter().map(|entry| &entry.applied)
    }

    /// SAN of every move applied so far, oldest first
    pub fn san_history(&self) -> Vec<String> {
        self.history
            .iter()
            .map(|entry| notation::san(&entry.board_before, entry.applied.chess_move))
            .collect()
    }

    /// SAN of a legal move in the current position
    pub fn san(&self, mv: ChessMove) -> String {
        notation::san(&self.board, mv)
    }

    /// Parse `e2e4`, `e7e8q` or SAN (`Nf3`, `exd5`, `O-O`) into a legal move
    pub fn parse_move(&self, text: &str) -> Result<ChessMove> {
        notation::parse_move(&self.board, &self.legal_moves(), text)
    }

    /// Build the move from `from` to `to`, promoting to a queen on the last rank
    pub fn move_between(&self, from: Square, to: Square) -> ChessMove {
        let promotion = match (self.board.piece_on(from), to.get_rank()) {
            (Some(Piece::Pawn), chess::Rank::First) | (Some(Piece::Pawn), chess::Rank::Eighth) => {
                Some(Piece::Queen)
            }
            _ => None,
        };
        ChessMove::new(from, to, promotion)
    }

    /// Draw condition that currently holds, if any
    pub fn draw_reason(&self) -> Option<DrawReason> {
        if self.board.status() == BoardStatus::Stalemate {
            Some(DrawReason::Stalemate)
        } else if self.is_insufficient_material() {
            Some(DrawReason::InsufficientMaterial)
        } else if self.halfmove_clock >= 100 {
            Some(DrawReason::FiftyMoveRule)
        } else if self.is_threefold_repetition() {
            Some(DrawReason::ThreefoldRepetition)
        } else {
            None
        }
    }

    /// Kings only, a single minor piece, or bishops all on one square color
    pub fn is_insufficient_material(&self) -> bool {
        let total = self.board.combined().popcnt();
        if total == 2 {
            return true;
        }

        let knights = self.board.pieces(Piece::Knight).popcnt();
        let bishops = *self.board.pieces(Piece::Bishop);
        if total == 3 && knights + bishops.popcnt() == 1 {
            return true;
        }

        if bishops.popcnt() + 2 == total {
            let light = bishops
                .filter(|sq| (sq.get_rank().to_index() + sq.get_file().to_index()) % 2 == 1)
                .count() as u32;
            return light == 0 || light == bishops.popcnt();
        }

        false
    }

    /// Current position occurred at least twice before since the last irreversible move
    pub fn is_threefold_repetition(&self) -> bool {
        let hash = self.board.get_hash();
        let window = (self.halfmove_clock as usize).min(self.history.len());
        let earlier = self.history[self.history.len() - window..]
            .iter()
            .filter(|entry| entry.board_before.get_hash() == hash)
            .count();
        earlier + 1 >= 3
    }

    fn describe(&self, mv: ChessMove) -> Option<AppliedMove> {
        let source = mv.get_source();
        let dest = mv.get_dest();
        let piece = self.board.piece_on(source)?;
        let color = self.board.color_on(source)?;

        let captured = match self.board.piece_on(dest) {
            Some(victim) => Some(victim),
            // En passant: a pawn changing file onto an empty square
            None if piece == Piece::Pawn && source.get_file() != dest.get_file() => {
                Some(Piece::Pawn)
            }
            None => None,
        };

        Some(AppliedMove {
            chess_move: mv,
            piece,
            color,
            captured,
            promotion: mv.get_promotion(),
        })
    }

    fn illegal(&self, mv: ChessMove) -> EngineError {
        EngineError::IllegalMove {
            mv: mv.to_string(),
            fen: self.fen(),
        }
    }
}

impl RulesEngine for ChessGame {
    fn legal_moves(&self) -> Vec<ChessMove> {
        // Promotions are always to a queen
        MoveGen::new_legal(&self.board)
            .filter(|mv| matches!(mv.get_promotion(), None | Some(Piece::Queen)))
            .collect()
    }

    fn apply_move(&mut self, mv: ChessMove) -> Result<AppliedMove> {
        if !self.legal_moves().contains(&mv) {
            return Err(self.illegal(mv));
        }
        let applied = self.describe(mv).ok_or_else(|| self.illegal(mv))?;

        self.history.push(HistoryEntry {
            board_before: self.board,
            halfmove_clock_before: self.halfmove_clock,
            fullmove_number_before: self.fullmove_number,
            applied,
        });

        self.board = self.board.make_move_new(mv);
        if applied.piece == Piece::Pawn || applied.captured.is_some() {
            self.halfmove_clock = 0;
        } else {
            self.halfmove_clock += 1;
        }
        if applied.color == Color::Black {
            self.fullmove_number += 1;
        }

        Ok(applied)
    }

    fn undo(&mut self) -> Result<AppliedMove> {
        let entry = self.history.pop().ok_or(EngineError::NothingToUndo)?;
        self.board = entry.board_before;
        self.halfmove_clock = entry.halfmove_clock_before;
        self.fullmove_number = entry.fullmove_number_before;
        Ok(entry.applied)
    }

    fn side_to_move(&self) -> Color {
        self.board.side_to_move()
    }

    fn piece_on(&self, square: Square) -> Option<(Piece, Color)> {
        Some((self.board.piece_on(square)?, self.board.color_on(square)?))
    }

    fn board(&self) -> &Board {
        &self.board
    }

    fn is_checkmate(&self) -> bool {
        self.board.status() == BoardStatus::Checkmate
    }

    fn is_draw(&self) -> bool {
        self.draw_reason().is_some()
    }

    fn in_check(&self) -> bool {
        self.board.checkers().popcnt() > 0
    }
}

/// Exclusive, temporary write lease on a position for the duration of one move.
///
/// Acquiring the lease applies the move; dropping it undoes the move. A failing undo
/// means the position no longer matches what the search believes it is, so it panics.
pub struct MoveLease<'a, E: RulesEngine + ?Sized> {
    engine: &'a mut E,
    applied: AppliedMove,
}

impl<'a, E: RulesEngine + ?Sized> MoveLease<'a, E> {
    pub fn acquire(engine: &'a mut E, mv: ChessMove) -> Result<Self> {
        let applied = engine.apply_move(mv)?;
        Ok(Self { engine, applied })
    }

    pub fn applied(&self) -> &AppliedMove {
        &self.applied
    }
}

impl<E: RulesEngine + ?Sized> Deref for MoveLease<'_, E> {
    type Target = E;

    fn deref(&self) -> &E {
        &*self.engine
    }
}

impl<E: RulesEngine + ?Sized> DerefMut for MoveLease<'_, E> {
    fn deref_mut(&mut self) -> &mut E {
        &mut *self.engine
    }
}

impl<E: RulesEngine + ?Sized> Drop for MoveLease<'_, E> {
    fn drop(&mut self) {
        match self.engine.undo() {
            Ok(undone) if undone.chess_move == self.applied.chess_move => {}
            Ok(undone) => panic!(
                "unbalanced make/unmake: leased {} but undid {}",
                self.applied.chess_move, undone.chess_move
            ),
            Err(error) => panic!(
                "unbalanced make/unmake: could not undo {}: {error}",
                self.applied.chess_move
            ),
        }
    }
}

/// Parse a square name such as `e4`
pub fn parse_square(text: &str) -> Result<Square> {
    Square::from_str(&text.trim().to_ascii_lowercase())
        .map_err(|_| EngineError::InvalidSquare(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mv(text: &str) -> ChessMove {
        ChessMove::from_str(text).unwrap()
    }

    #[test]
    fn test_start_position() {
        let game = ChessGame::new();
        assert_eq!(game.legal_moves().len(), 20);
        assert_eq!(game.side_to_move(), Color::White);
        assert!(!game.is_terminal());
        assert_eq!(game.fen(), START_FEN);
    }

    #[test]
    fn test_apply_and_undo_restore_position() {
        let mut game = ChessGame::new();
        let before = game.clone();

        let applied = game.apply_move(mv("e2e4")).unwrap();
        assert_eq!(applied.piece, Piece::Pawn);
        assert_eq!(applied.color, Color::White);
        assert_eq!(game.side_to_move(), Color::Black);

        game.apply_move(mv("d7d5")).unwrap();
        let capture = game.apply_move(mv("e4d5")).unwrap();
        assert_eq!(capture.captured, Some(Piece::Pawn));
        assert_eq!(game.fullmove_number(), 2);
        game.apply_move(mv("d8d5")).unwrap();
        assert_eq!(game.fullmove_number(), 3);

        for _ in 0..4 {
            game.undo().unwrap();
        }
        assert_eq!(game, before);
        assert_eq!(game.undo(), Err(EngineError::NothingToUndo));
    }

    #[test]
    fn test_illegal_move_rejected() {
        let mut game = ChessGame::new();
        let before = game.clone();
        let err = game.apply_move(mv("e2e5")).unwrap_err();
        assert!(matches!(err, EngineError::IllegalMove { .. }));
        assert_eq!(game, before);
    }

    #[test]
    fn test_only_queen_promotions_enumerated() {
        let game = ChessGame::from_fen("8/P6k/8/8/8/8/8/K7 w - - 0 1").unwrap();
        let promotions: Vec<ChessMove> = game
            .legal_moves()
            .into_iter()
            .filter(|m| m.get_source() == Square::A7)
            .collect();
        assert_eq!(promotions, vec![ChessMove::new(Square::A7, Square::A8, Some(Piece::Queen))]);
        assert_eq!(
            game.move_between(Square::A7, Square::A8),
            ChessMove::new(Square::A7, Square::A8, Some(Piece::Queen))
        );
    }

    #[test]
    fn test_en_passant_capture_recorded() {
        let mut game =
            ChessGame::from_fen("rnbqkbnr/ppp1pppp/8/3pP3/8/8/PPPP1PPP/RNBQKBNR b KQkq - 0 2")
                .unwrap();
        game.apply_move(mv("f7f5")).unwrap();
        let applied = game.apply_move(mv("e5f6")).unwrap();
        assert_eq!(applied.captured, Some(Piece::Pawn));
        assert_eq!(game.board().piece_on(Square::F5), None);
    }

    #[test]
    fn test_checkmate_detection() {
        // Fool's mate
        let mut game = ChessGame::new();
        for m in ["f2f3", "e7e5", "g2g4", "d8h4"] {
            game.apply_move(mv(m)).unwrap();
        }
        assert!(game.is_checkmate());
        assert!(game.in_check());
        assert!(game.is_terminal());
        assert!(!game.is_draw());
        assert!(game.legal_moves().is_empty());
    }

    #[test]
    fn test_stalemate_is_draw() {
        let game = ChessGame::from_fen("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").unwrap();
        assert!(!game.is_checkmate());
        assert_eq!(game.draw_reason(), Some(DrawReason::Stalemate));
        assert!(game.is_terminal());
    }

    #[test]
    fn test_insufficient_material() {
        let bare = ChessGame::from_fen("8/8/4k3/8/8/3K4/8/8 w - - 0 1").unwrap();
        assert_eq!(bare.draw_reason(), Some(DrawReason::InsufficientMaterial));

        let knight = ChessGame::from_fen("8/8/4k3/8/8/3K4/8/6N1 w - - 0 1").unwrap();
        assert!(knight.is_insufficient_material());

        // Bishops on c1 and f8 are both dark squares
        let same_color = ChessGame::from_fen("5b2/8/4k3/8/8/3K4/8/2B5 w - - 0 1").unwrap();
        assert!(same_color.is_insufficient_material());

        // c1 dark, c8 light
        let opposite = ChessGame::from_fen("2b5/8/4k3/8/8/3K4/8/2B5 w - - 0 1").unwrap();
        assert!(!opposite.is_insufficient_material());

        let rook = ChessGame::from_fen("8/8/4k3/8/8/3K4/8/6R1 w - - 0 1").unwrap();
        assert!(!rook.is_insufficient_material());
    }

    #[test]
    fn test_threefold_repetition() {
        let mut game = ChessGame::new();
        let shuffle = ["g1f3", "g8f6", "f3g1", "f6g8"];
        for m in shuffle {
            game.apply_move(mv(m)).unwrap();
        }
        assert!(!game.is_threefold_repetition());
        for m in shuffle {
            game.apply_move(mv(m)).unwrap();
        }
        assert_eq!(game.draw_reason(), Some(DrawReason::ThreefoldRepetition));
    }

    #[test]
    fn test_fifty_move_rule_and_counters() {
        let game = ChessGame::from_fen("8/8/4k3/8/8/3K4/8/R7 w - - 100 80").unwrap();
        assert_eq!(game.halfmove_clock(), 100);
        assert_eq!(game.fullmove_number(), 80);
        assert_eq!(game.draw_reason(), Some(DrawReason::FiftyMoveRule));
    }

    #[test]
    fn test_invalid_fen() {
        assert!(matches!(
            ChessGame::from_fen("not a fen"),
            Err(EngineError::InvalidPosition(_))
        ));
    }

    #[test]
    fn test_move_lease_undoes_on_drop() {
        let mut game = ChessGame::new();
        let before = game.clone();
        {
            let lease = MoveLease::acquire(&mut game, mv("g1f3")).unwrap();
            assert_eq!(lease.side_to_move(), Color::Black);
            assert_eq!(lease.applied().piece, Piece::Knight);
        }
        assert_eq!(game, before);
    }

    #[test]
    fn test_legal_moves_from_square() {
        let game = ChessGame::new();
        let knight_moves = game.legal_moves_from(Square::G1);
        assert_eq!(knight_moves.len(), 2);
        assert!(game.legal_moves_from(Square::E4).is_empty());
    }

    #[test]
    fn test_parse_square() {
        assert_eq!(parse_square("e4").unwrap(), Square::E4);
        assert_eq!(parse_square("H8").unwrap(), Square::H8);
        assert!(parse_square("z9").is_err());
    }
}
