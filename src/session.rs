//! One human-versus-engine game: the orchestrator between input, rules and search.
//!
//! A `GameSession` owns its position, selection state and engine settings. Nothing is
//! process-wide, so any number of sessions can run side by side.

use crate::config::EngineConfig;
use crate::errors::{EngineError, Result};
use crate::evaluation::Evaluator;
use crate::notation::square_name;
use crate::rules::{parse_square, ChessGame, DrawReason, RulesEngine, START_FEN};
use crate::search::{random_legal_move, MoveSelector, SearchResult};
use crate::worker::{EngineWorker, PendingSearch};
use chess::{ChessMove, Color, Piece, Square};
use chrono::{DateTime, Local};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

pub fn color_name(color: Color) -> &'static str {
    match color {
        Color::White => "White",
        Color::Black => "Black",
    }
}

/// Where the game stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    Checkmate { loser: Color },
    Draw(DrawReason),
    InProgress { to_move: Color, in_check: bool },
}

impl GameStatus {
    pub fn is_over(&self) -> bool {
        !matches!(self, GameStatus::InProgress { .. })
    }

    /// PGN result token
    pub fn result_token(&self) -> &'static str {
        match self {
            GameStatus::Checkmate { loser: Color::White } => "0-1",
            GameStatus::Checkmate { loser: Color::Black } => "1-0",
            GameStatus::Draw(_) => "1/2-1/2",
            GameStatus::InProgress { .. } => "*",
        }
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameStatus::Checkmate { loser } => {
                write!(f, "Game over, {} is in checkmate.", color_name(*loser))
            }
            GameStatus::Draw(_) => write!(f, "Game over, drawn position"),
            GameStatus::InProgress { to_move, in_check } => {
                let name = color_name(*to_move);
                write!(f, "{name} to move")?;
                if *in_check {
                    write!(f, ", {name} is in check")?;
                }
                Ok(())
            }
        }
    }
}

/// What happened when a move was played
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveReport {
    pub chess_move: ChessMove,
    pub san: String,
    pub color: Color,
    pub captured: Option<Piece>,
    /// Drives the distinct "check" feedback cue
    pub gives_check: bool,
    pub status: GameStatus,
}

/// Outcome of clicking a board square
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SquareClick {
    /// An own piece is now selected; `targets` are its legal destinations
    Selected { square: Square, targets: Vec<Square> },
    Moved(MoveReport),
    Deselected,
    Ignored,
}

/// One numbered line of the move list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRow {
    pub number: u32,
    pub white: Option<String>,
    pub black: Option<String>,
}

impl fmt::Display for MoveRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}. {} {}",
            self.number,
            self.white.as_deref().unwrap_or("..."),
            self.black.as_deref().unwrap_or("")
        )
    }
}

/// Pieces each side has taken, relative to the initial set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedPieces {
    /// Black pieces captured by White
    pub by_white: Vec<Piece>,
    /// White pieces captured by Black
    pub by_black: Vec<Piece>,
}

const INITIAL_SET: [(Piece, u32); 5] = [
    (Piece::Pawn, 8),
    (Piece::Knight, 2),
    (Piece::Bishop, 2),
    (Piece::Rook, 2),
    (Piece::Queen, 1),
];

/// Human-versus-engine game session
pub struct GameSession {
    game: ChessGame,
    config: EngineConfig,
    evaluator: Evaluator,
    selected: Option<Square>,
    rng: StdRng,
    pending: Option<PendingSearch>,
    initial_fen: String,
    initial_fullmove: u32,
    started_at: DateTime<Local>,
}

impl GameSession {
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::from_fen(START_FEN, config)
    }

    pub fn from_fen(fen: &str, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let game = ChessGame::from_fen(fen)?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        info!(fen = %game.fen(), human = %config.human_color, "new game session");

        Ok(Self {
            initial_fen: game.fen(),
            initial_fullmove: game.fullmove_number(),
            evaluator: Evaluator::with_piece_values(config.piece_values),
            game,
            config,
            selected: None,
            rng,
            pending: None,
            started_at: Local::now(),
        })
    }

    pub fn game(&self) -> &ChessGame {
        &self.game
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn human_color(&self) -> Color {
        self.config.human_color.into()
    }

    pub fn engine_color(&self) -> Color {
        self.config.engine_color()
    }

    pub fn is_human_turn(&self) -> bool {
        self.game.side_to_move() == self.human_color()
    }

    pub fn selected_square(&self) -> Option<Square> {
        self.selected
    }

    pub fn status(&self) -> GameStatus {
        if self.game.is_checkmate() {
            GameStatus::Checkmate {
                loser: self.game.side_to_move(),
            }
        } else if let Some(reason) = self.game.draw_reason() {
            GameStatus::Draw(reason)
        } else {
            GameStatus::InProgress {
                to_move: self.game.side_to_move(),
                in_check: self.game.in_check(),
            }
        }
    }

    /// Static evaluation of the current position (White's perspective)
    pub fn evaluation(&self) -> i32 {
        self.evaluator.evaluate(self.game.board())
    }

    /// Legal destinations of the piece on `square`
    pub fn legal_targets(&self, square: Square) -> Vec<Square> {
        self.game
            .legal_moves_from(square)
            .into_iter()
            .map(|mv| mv.get_dest())
            .collect()
    }

    /// Select / move / reselect / deselect, the way a board click behaves
    pub fn click_square(&mut self, square: Square) -> Result<SquareClick> {
        if !self.is_human_turn() || self.status().is_over() {
            self.selected = None;
            return Ok(SquareClick::Ignored);
        }

        if let Some(from) = self.selected {
            let mv = self.game.move_between(from, square);
            if self.game.legal_moves().contains(&mv) {
                self.selected = None;
                return self.play_human_move(from, square).map(SquareClick::Moved);
            }
            if self.owns(square) {
                return Ok(self.select(square));
            }
            self.selected = None;
            return Ok(SquareClick::Deselected);
        }

        if self.owns(square) {
            Ok(self.select(square))
        } else {
            Ok(SquareClick::Ignored)
        }
    }

    fn owns(&self, square: Square) -> bool {
        matches!(self.game.piece_on(square), Some((_, color)) if color == self.game.side_to_move())
    }

    fn select(&mut self, square: Square) -> SquareClick {
        self.selected = Some(square);
        SquareClick::Selected {
            square,
            targets: self.legal_targets(square),
        }
    }

    /// Play the human's move from `from` to `to`, promoting to a queen on the last rank
    pub fn play_human_move(&mut self, from: Square, to: Square) -> Result<MoveReport> {
        self.ensure_human_can_move()?;
        let mv = self.game.move_between(from, to);
        self.play_human(mv)
    }

    /// Play the human's move given as `e2e4` or SAN
    pub fn play_human_text(&mut self, text: &str) -> Result<MoveReport> {
        self.ensure_human_can_move()?;
        let mv = self.game.parse_move(text)?;
        self.play_human(mv)
    }

    /// Same as [`play_human_move`](Self::play_human_move) with square names
    pub fn play_human_squares(&mut self, from: &str, to: &str) -> Result<MoveReport> {
        self.play_human_move(parse_square(from)?, parse_square(to)?)
    }

    /// Game still running and the human is to move
    fn ensure_human_can_move(&self) -> Result<()> {
        let status = self.status();
        if status.is_over() {
            return Err(EngineError::GameOver(status.to_string()));
        }
        if !self.is_human_turn() {
            return Err(EngineError::NotYourTurn);
        }
        Ok(())
    }

    fn play_human(&mut self, mv: ChessMove) -> Result<MoveReport> {
        self.ensure_human_can_move()?;
        self.selected = None;
        self.apply_reported(mv)
    }

    fn apply_reported(&mut self, mv: ChessMove) -> Result<MoveReport> {
        let san = self.game.san(mv);
        let applied = self.game.apply_move(mv)?;
        let status = self.status();
        let report = MoveReport {
            chess_move: mv,
            san,
            color: applied.color,
            captured: applied.captured,
            gives_check: self.game.in_check(),
            status,
        };
        info!(
            san = %report.san,
            color = color_name(report.color),
            check = report.gives_check,
            status = %report.status,
            "move applied"
        );
        Ok(report)
    }

    fn engine_should_move(&self) -> bool {
        !self.is_human_turn() && !self.status().is_over()
    }

    /// Search and play the engine's move on the calling thread.
    ///
    /// Returns `None` when it is not the engine's turn or the game is over.
    pub fn engine_reply(&mut self) -> Result<Option<MoveReport>> {
        if !self.engine_should_move() {
            return Ok(None);
        }
        let side = self.engine_color();
        let selector = MoveSelector::new(&self.evaluator, self.config.search.clone());
        let chosen = selector.select_move(&mut self.game, side)?;
        self.finish_engine_turn(chosen)
    }

    fn finish_engine_turn(&mut self, chosen: Option<ChessMove>) -> Result<Option<MoveReport>> {
        let mv = match chosen {
            Some(mv) => mv,
            None => match random_legal_move(&self.game, &mut self.rng) {
                Some(mv) => {
                    warn!(mv = %mv, "selector produced no move, playing a random legal move");
                    mv
                }
                None => return Ok(None),
            },
        };
        self.apply_reported(mv).map(Some)
    }

    /// Start the engine's search in the background after the configured delay.
    ///
    /// Returns false if it is not the engine's turn or a search is already pending.
    pub fn request_engine_reply(&mut self) -> bool {
        if self.pending.is_some() || !self.engine_should_move() {
            return false;
        }
        self.pending = Some(EngineWorker::spawn(
            self.game.clone(),
            self.evaluator.clone(),
            self.config.search.clone(),
            self.engine_color(),
            Duration::from_millis(self.config.engine_delay_ms),
        ));
        true
    }

    pub fn has_pending_reply(&self) -> bool {
        self.pending.is_some()
    }

    /// Play the background search's move if it has finished
    pub fn poll_engine_reply(&mut self) -> Result<Option<MoveReport>> {
        let outcome = match self.pending.as_mut().and_then(|pending| pending.try_result()) {
            Some(outcome) => outcome,
            None => return Ok(None),
        };
        let fresh = self
            .pending
            .take()
            .is_some_and(|pending| pending.is_for(&self.game));
        self.accept_search(fresh, outcome)
    }

    /// Block until the background search finishes and play its move
    pub fn wait_engine_reply(&mut self) -> Result<Option<MoveReport>> {
        let pending = match self.pending.take() {
            Some(pending) => pending,
            None => return Ok(None),
        };
        let fresh = pending.is_for(&self.game);
        let outcome = pending.wait();
        self.accept_search(fresh, outcome)
    }

    fn accept_search(
        &mut self,
        fresh: bool,
        outcome: Result<SearchResult>,
    ) -> Result<Option<MoveReport>> {
        if !fresh {
            warn!("discarding engine result computed for a stale position");
            return Ok(None);
        }
        match outcome {
            Ok(result) => {
                debug!(
                    nodes = result.nodes_searched,
                    evaluation = result.evaluation,
                    "background search finished"
                );
                self.finish_engine_turn(result.best_move)
            }
            Err(EngineError::SearchCancelled) => Ok(None),
            Err(error) => Err(error),
        }
    }

    /// Cancel any in-flight engine search
    pub fn cancel_engine_reply(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.cancel();
            warn!("engine search cancelled");
        }
    }

    /// Undo back to the human's previous turn; returns how many plies were undone
    pub fn take_back(&mut self) -> Result<usize> {
        self.cancel_engine_reply();
        self.selected = None;

        let mut undone = 0;
        loop {
            self.game.undo()?;
            undone += 1;
            if self.is_human_turn() || self.game.ply_count() == 0 {
                break;
            }
        }
        info!(plies = undone, "took back");
        Ok(undone)
    }

    /// Numbered SAN rows, `1. e4 e5`
    pub fn move_history(&self) -> Vec<MoveRow> {
        let mut rows: Vec<MoveRow> = Vec::new();
        let mut number = self.initial_fullmove;
        for (applied, san) in self.game.applied_moves().zip(self.game.san_history()) {
            match applied.color {
                Color::White => rows.push(MoveRow {
                    number,
                    white: Some(san),
                    black: None,
                }),
                Color::Black => {
                    match rows.last_mut() {
                        Some(row) if row.number == number && row.black.is_none() => {
                            row.black = Some(san)
                        }
                        _ => rows.push(MoveRow {
                            number,
                            white: None,
                            black: Some(san),
                        }),
                    }
                    number += 1;
                }
            }
        }
        rows
    }

    /// Tally of captured pieces from the piece counts on the board
    pub fn captured_pieces(&self) -> CapturedPieces {
        let board = self.game.board();
        let missing = |color: Color| -> Vec<Piece> {
            let mut pieces = Vec::new();
            for (piece, initial) in INITIAL_SET {
                let on_board = (*board.pieces(piece) & *board.color_combined(color)).popcnt();
                for _ in on_board..initial {
                    pieces.push(piece);
                }
            }
            pieces
        };

        CapturedPieces {
            by_white: missing(Color::Black),
            by_black: missing(Color::White),
        }
    }

    /// Game record in PGN
    pub fn to_pgn(&self) -> String {
        let status = self.status();
        let (white, black) = match self.human_color() {
            Color::White => ("Human", "Engine"),
            Color::Black => ("Engine", "Human"),
        };

        let mut pgn = String::new();
        pgn.push_str("[Event \"Casual game\"]\n");
        pgn.push_str("[Site \"?\"]\n");
        pgn.push_str(&format!("[Date \"{}\"]\n", self.started_at.format("%Y.%m.%d")));
        pgn.push_str("[Round \"-\"]\n");
        pgn.push_str(&format!("[White \"{white}\"]\n"));
        pgn.push_str(&format!("[Black \"{black}\"]\n"));
        pgn.push_str(&format!("[Result \"{}\"]\n", status.result_token()));
        if self.initial_fen != START_FEN {
            pgn.push_str("[SetUp \"1\"]\n");
            pgn.push_str(&format!("[FEN \"{}\"]\n", self.initial_fen));
        }
        pgn.push('\n');

        let mut movetext: Vec<String> = Vec::new();
        for row in self.move_history() {
            match (&row.white, &row.black) {
                (Some(white), Some(black)) => {
                    movetext.push(format!("{}. {} {}", row.number, white, black))
                }
                (Some(white), None) => movetext.push(format!("{}. {}", row.number, white)),
                (None, Some(black)) => movetext.push(format!("{}... {}", row.number, black)),
                (None, None) => {}
            }
        }
        movetext.push(status.result_token().to_string());
        pgn.push_str(&movetext.join(" "));
        pgn.push('\n');
        pgn
    }

    /// Squares as names, for display of hints
    pub fn target_names(&self, square: Square) -> Vec<String> {
        self.legal_targets(square).into_iter().map(square_name).collect()
    }
}
