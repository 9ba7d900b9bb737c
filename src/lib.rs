//! # Chess Opponent Engine
//!
//! A small, self-contained **computer chess opponent**: a static position evaluator,
//! a fixed-depth minimax search with alpha-beta pruning, and a root move selector,
//! wired into a game session that plays against a human.
//!
//! ## Features
//!
//! - **Material + piece-square evaluation**: classic simplified-evaluation tables, scored
//!   from White's point of view
//! - **Alpha-beta search**: fail-soft pruning that returns exactly the minimax value
//! - **Deterministic move choice**: the first of equally scored root moves wins
//! - **Game sessions**: click-to-move selection, SAN history, captured pieces, take back,
//!   PGN export and an engine reply computed off the caller's thread
//!
//! ## Quick Start
//!
//! ```rust
//! use chess_opponent_engine::{select_move, ChessGame, RulesEngine};
//! use chess::Color;
//!
//! let mut game = ChessGame::new();
//! let reply = select_move(&mut game, 2, Color::White).unwrap();
//! assert!(reply.is_some());
//!
//! // The search leaves the position untouched
//! assert_eq!(game, ChessGame::new());
//! assert_eq!(game.side_to_move(), Color::White);
//! ```
//!
//! Playing a game against the engine:
//!
//! ```rust
//! use chess_opponent_engine::{EngineConfig, GameSession};
//!
//! let mut session = GameSession::new(EngineConfig::default()).unwrap();
//! let report = session.play_human_text("e4").unwrap();
//! assert_eq!(report.san, "e4");
//!
//! let reply = session.engine_reply().unwrap();
//! assert!(reply.is_some());
//! println!("{}", session.status());
//! ```

// Core modules
pub mod errors;
pub mod rules;

// Re-export commonly used types
pub use errors::{EngineError, Result};

pub mod config;
pub mod evaluation;
pub mod notation;
pub mod search;
pub mod session;
pub mod worker;

pub use config::{EngineConfig, PlayerColor};
pub use evaluation::{
    EvaluationBreakdown, EvaluationComponent, Evaluator, MaterialComponent,
    PieceSquareComponent, PieceSquareTables, PieceValues, PIECE_SQUARE_TABLES,
};
pub use rules::{
    parse_square, AppliedMove, ChessGame, DrawReason, MoveLease, RulesEngine, START_FEN,
};
pub use search::{
    random_legal_move, select_move, AlphaBeta, CancellationToken, MoveSelector, SearchConfig,
    SearchNode, SearchResult, SearchStats, TerminalScoring, MATE_SCORE, MAX_SEARCH_DEPTH,
    SCORE_INFINITY,
};
pub use session::{
    CapturedPieces, GameSession, GameStatus, MoveReport, MoveRow, SquareClick,
};
pub use worker::{EngineWorker, PendingSearch};
