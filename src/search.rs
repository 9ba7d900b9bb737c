//! Fixed-depth minimax with alpha-beta pruning, and the root move selector built on it.
//!
//! Scores are always from White's point of view: White maximizes, Black minimizes.
//! The position is only ever mutated through [`MoveLease`], so every subtree leaves it
//! exactly as it found it.

use crate::errors::{EngineError, Result};
use crate::evaluation::Evaluator;
use crate::rules::{MoveLease, RulesEngine};
use chess::{ChessMove, Color};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;
#[cfg(feature = "verbose")]
use tracing::trace;

/// Magnitude of a checkmate score; far above any material sum
pub const MATE_SCORE: i32 = 100_000;

/// Bound used for the (−∞, +∞) search window
pub const SCORE_INFINITY: i32 = 1_000_000;

/// Deepest search the configuration accepts
pub const MAX_SEARCH_DEPTH: u32 = 6;

/// How leaves that are true game ends are scored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalScoring {
    /// Checkmate scores ±(MATE_SCORE - ply), other game ends score 0
    Decisive,
    /// Every leaf is scored by the static evaluator, game over or not
    Static,
}

/// Search configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Plies searched below each root move
    pub depth: u32,
    /// How checkmates and draws reached inside the tree are scored
    pub terminal_scoring: TerminalScoring,
    /// Narrow the window across root siblings using the running best score
    pub narrow_root_window: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            depth: 2,
            terminal_scoring: TerminalScoring::Decisive,
            narrow_root_window: true,
        }
    }
}

impl SearchConfig {
    /// Browser-game behavior: two plies below each root move, every leaf scored statically
    pub fn reference() -> Self {
        Self {
            depth: 2,
            terminal_scoring: TerminalScoring::Static,
            narrow_root_window: true,
        }
    }

    /// Single reply lookahead
    pub fn fast() -> Self {
        Self {
            depth: 1,
            ..Self::default()
        }
    }

    /// Deeper search for analysis
    pub fn strong() -> Self {
        Self {
            depth: 4,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.depth > MAX_SEARCH_DEPTH {
            return Err(EngineError::Configuration {
                field: "depth".to_string(),
                value: self.depth.to_string(),
                expected: format!("0..={MAX_SEARCH_DEPTH}"),
            });
        }
        Ok(())
    }
}

/// Per-call search state: remaining depth, distance from the root and the window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchNode {
    pub depth: u32,
    pub ply: u32,
    pub alpha: i32,
    pub beta: i32,
    pub maximizing: bool,
}

impl SearchNode {
    fn child(&self, alpha: i32, beta: i32) -> Self {
        Self {
            depth: self.depth - 1,
            ply: self.ply + 1,
            alpha,
            beta,
            maximizing: !self.maximizing,
        }
    }
}

/// Counters collected while searching
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub nodes: u64,
    pub leaves: u64,
    pub cutoffs: u64,
}

/// Cooperative cancellation flag shared between a search and its owner
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Recursive alpha-beta searcher
pub struct AlphaBeta<'a> {
    evaluator: &'a Evaluator,
    terminal_scoring: TerminalScoring,
    cancellation: Option<CancellationToken>,
    stats: SearchStats,
}

impl<'a> AlphaBeta<'a> {
    pub fn new(evaluator: &'a Evaluator, terminal_scoring: TerminalScoring) -> Self {
        Self {
            evaluator,
            terminal_scoring,
            cancellation: None,
            stats: SearchStats::default(),
        }
    }

    /// Abort with [`EngineError::SearchCancelled`] once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn stats(&self) -> SearchStats {
        self.stats
    }

    /// Minimax value of `position` searched `depth` plies deep inside `[alpha, beta]`.
    ///
    /// Fail-soft: when a cutoff happens the returned value lies outside the window.
    /// Panics if `alpha > beta`.
    pub fn search<E: RulesEngine + ?Sized>(
        &mut self,
        position: &mut E,
        depth: u32,
        alpha: i32,
        beta: i32,
        maximizing: bool,
    ) -> Result<i32> {
        self.search_node(
            position,
            SearchNode {
                depth,
                ply: 0,
                alpha,
                beta,
                maximizing,
            },
        )
    }

    pub fn search_node<E: RulesEngine + ?Sized>(
        &mut self,
        position: &mut E,
        node: SearchNode,
    ) -> Result<i32> {
        assert!(
            node.alpha <= node.beta,
            "alpha-beta window inverted at ply {}: alpha {} > beta {}",
            node.ply,
            node.alpha,
            node.beta
        );
        self.check_cancelled()?;
        self.stats.nodes += 1;

        if node.depth == 0 || position.is_terminal() {
            self.stats.leaves += 1;
            return Ok(self.leaf_value(position, node.ply));
        }

        let mut alpha = node.alpha;
        let mut beta = node.beta;

        if node.maximizing {
            let mut best_eval = -SCORE_INFINITY;
            for mv in position.legal_moves() {
                let eval = {
                    let mut child = MoveLease::acquire(position, mv)?;
                    self.search_node(&mut *child, node.child(alpha, beta))?
                };
                best_eval = best_eval.max(eval);
                alpha = alpha.max(best_eval);
                if beta <= alpha {
                    self.record_cutoff(node, mv);
                    return Ok(best_eval);
                }
            }
            Ok(best_eval)
        } else {
            let mut best_eval = SCORE_INFINITY;
            for mv in position.legal_moves() {
                let eval = {
                    let mut child = MoveLease::acquire(position, mv)?;
                    self.search_node(&mut *child, node.child(alpha, beta))?
                };
                best_eval = best_eval.min(eval);
                beta = beta.min(best_eval);
                if beta <= alpha {
                    self.record_cutoff(node, mv);
                    return Ok(best_eval);
                }
            }
            Ok(best_eval)
        }
    }

    /// Plain minimax over the same move order, without pruning
    pub fn minimax<E: RulesEngine + ?Sized>(
        &mut self,
        position: &mut E,
        depth: u32,
        maximizing: bool,
    ) -> Result<i32> {
        self.minimax_at(position, depth, 0, maximizing)
    }

    fn minimax_at<E: RulesEngine + ?Sized>(
        &mut self,
        position: &mut E,
        depth: u32,
        ply: u32,
        maximizing: bool,
    ) -> Result<i32> {
        self.check_cancelled()?;
        self.stats.nodes += 1;

        if depth == 0 || position.is_terminal() {
            self.stats.leaves += 1;
            return Ok(self.leaf_value(position, ply));
        }

        let mut best_eval = if maximizing {
            -SCORE_INFINITY
        } else {
            SCORE_INFINITY
        };
        for mv in position.legal_moves() {
            let mut child = MoveLease::acquire(position, mv)?;
            let eval = self.minimax_at(&mut *child, depth - 1, ply + 1, !maximizing)?;
            best_eval = if maximizing {
                best_eval.max(eval)
            } else {
                best_eval.min(eval)
            };
        }
        Ok(best_eval)
    }

    /// Static value of a node where the search stops
    pub fn leaf_value<E: RulesEngine + ?Sized>(&self, position: &E, ply: u32) -> i32 {
        if self.terminal_scoring == TerminalScoring::Decisive {
            if position.is_checkmate() {
                let mate = MATE_SCORE - ply as i32;
                return match position.side_to_move() {
                    Color::White => -mate,
                    Color::Black => mate,
                };
            }
            if position.is_draw() {
                return 0;
            }
        }
        self.evaluator.evaluate(position.board())
    }

    fn check_cancelled(&self) -> Result<()> {
        match &self.cancellation {
            Some(token) if token.is_cancelled() => Err(EngineError::SearchCancelled),
            _ => Ok(()),
        }
    }

    #[allow(unused_variables)]
    fn record_cutoff(&mut self, node: SearchNode, mv: ChessMove) {
        self.stats.cutoffs += 1;
        #[cfg(feature = "verbose")]
        trace!(ply = node.ply, depth = node.depth, mv = %mv, "cutoff");
    }
}

/// Outcome of a root search
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// Score of the chosen move (White's perspective)
    pub evaluation: i32,
    pub best_move: Option<ChessMove>,
    pub depth: u32,
    pub nodes_searched: u64,
    pub cutoffs: u64,
    pub time_elapsed: Duration,
    /// Every root move in enumeration order with its score. With root window narrowing
    /// a move refuted by the window carries a bound rather than its exact value.
    pub root_scores: Vec<(ChessMove, i32)>,
}

/// Chooses a move for one side by searching every root move
pub struct MoveSelector<'a> {
    evaluator: &'a Evaluator,
    config: SearchConfig,
    cancellation: Option<CancellationToken>,
}

impl<'a> MoveSelector<'a> {
    pub fn new(evaluator: &'a Evaluator, config: SearchConfig) -> Self {
        Self {
            evaluator,
            config,
            cancellation: None,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Best move for `side`, or `None` when it has no legal move
    pub fn select_move<E: RulesEngine + ?Sized>(
        &self,
        position: &mut E,
        side: Color,
    ) -> Result<Option<ChessMove>> {
        Ok(self.search_root(position, side)?.best_move)
    }

    /// Search every legal root move and keep the first one with the best score for `side`
    pub fn search_root<E: RulesEngine + ?Sized>(
        &self,
        position: &mut E,
        side: Color,
    ) -> Result<SearchResult> {
        let start = Instant::now();
        let to_move = position.side_to_move();
        if side != to_move {
            return Err(EngineError::WrongSideToMove {
                requested: format!("{side:?}"),
                to_move: format!("{to_move:?}"),
            });
        }

        let mut searcher = AlphaBeta::new(self.evaluator, self.config.terminal_scoring);
        if let Some(token) = &self.cancellation {
            searcher = searcher.with_cancellation(token.clone());
        }

        let maximizing_root = side == Color::White;
        let moves = position.legal_moves();
        if moves.is_empty() {
            debug!(side = ?side, "no legal root moves");
            return Ok(SearchResult {
                evaluation: searcher.leaf_value(position, 0),
                best_move: None,
                depth: self.config.depth,
                nodes_searched: 0,
                cutoffs: 0,
                time_elapsed: start.elapsed(),
                root_scores: Vec::new(),
            });
        }

        let mut best_move = None;
        let mut best_eval = if maximizing_root {
            -SCORE_INFINITY
        } else {
            SCORE_INFINITY
        };
        let mut alpha = -SCORE_INFINITY;
        let mut beta = SCORE_INFINITY;
        let mut root_scores = Vec::with_capacity(moves.len());

        for mv in moves {
            let (lower, upper) = if self.config.narrow_root_window {
                (alpha, beta)
            } else {
                (-SCORE_INFINITY, SCORE_INFINITY)
            };

            let eval = {
                let mut child = MoveLease::acquire(position, mv)?;
                let node = SearchNode {
                    depth: self.config.depth,
                    ply: 1,
                    alpha: lower,
                    beta: upper,
                    maximizing: child.side_to_move() == Color::White,
                };
                searcher.search_node(&mut *child, node)?
            };
            debug!(mv = %mv, score = eval, "root move scored");
            root_scores.push((mv, eval));

            let improves = if maximizing_root {
                eval > best_eval
            } else {
                eval < best_eval
            };
            if best_move.is_none() || improves {
                best_eval = eval;
                best_move = Some(mv);
            }

            if maximizing_root {
                alpha = alpha.max(best_eval);
            } else {
                beta = beta.min(best_eval);
            }
        }

        let stats = searcher.stats();
        let result = SearchResult {
            evaluation: best_eval,
            best_move,
            depth: self.config.depth,
            nodes_searched: stats.nodes,
            cutoffs: stats.cutoffs,
            time_elapsed: start.elapsed(),
            root_scores,
        };
        debug!(
            best_move = ?result.best_move.map(|m| m.to_string()),
            evaluation = result.evaluation,
            nodes = result.nodes_searched,
            cutoffs = result.cutoffs,
            elapsed_ms = result.time_elapsed.as_millis() as u64,
            "root search finished"
        );
        Ok(result)
    }
}

/// Best move for `side` at `depth` with the default evaluator and scoring
pub fn select_move<E: RulesEngine + ?Sized>(
    position: &mut E,
    depth: u32,
    side: Color,
) -> Result<Option<ChessMove>> {
    let evaluator = Evaluator::new();
    let config = SearchConfig {
        depth,
        ..SearchConfig::default()
    };
    MoveSelector::new(&evaluator, config).select_move(position, side)
}

/// Uniformly random legal move; the fallback when the selector yields nothing
pub fn random_legal_move<E, R>(position: &E, rng: &mut R) -> Option<ChessMove>
where
    E: RulesEngine + ?Sized,
    R: Rng + ?Sized,
{
    position.legal_moves().choose(rng).copied()
}
