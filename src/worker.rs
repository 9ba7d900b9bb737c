//! Background engine search on an immutable position snapshot.
//!
//! The live position is never shared with the worker thread: the worker owns a clone,
//! so the presentation side can keep reading its game while the engine thinks.

use crate::errors::{EngineError, Result};
use crate::evaluation::Evaluator;
use crate::rules::ChessGame;
use crate::search::{CancellationToken, MoveSelector, SearchConfig, SearchResult};
use chess::Color;
use crossbeam::channel::{self, Receiver, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const DELAY_SLICE: Duration = Duration::from_millis(10);

/// Spawns engine searches off the caller's thread
pub struct EngineWorker;

impl EngineWorker {
    /// Wait `delay`, then search `snapshot` for `side` on a new thread
    pub fn spawn(
        snapshot: ChessGame,
        evaluator: Evaluator,
        config: SearchConfig,
        side: Color,
        delay: Duration,
    ) -> PendingSearch {
        let token = CancellationToken::new();
        let (sender, receiver) = channel::bounded(1);
        let snapshot_fen = snapshot.fen();
        let snapshot_ply = snapshot.ply_count();

        let worker_token = token.clone();
        let handle = thread::spawn(move || {
            let mut position = snapshot;
            let outcome = if wait_unless_cancelled(delay, &worker_token) {
                MoveSelector::new(&evaluator, config)
                    .with_cancellation(worker_token)
                    .search_root(&mut position, side)
            } else {
                Err(EngineError::SearchCancelled)
            };
            // Receiver may already be gone if the search was abandoned
            let _ = sender.send(outcome);
        });

        debug!(fen = %snapshot_fen, side = ?side, "engine search spawned");
        PendingSearch {
            token,
            receiver,
            handle: Some(handle),
            snapshot_fen,
            snapshot_ply,
        }
    }
}

/// Returns false if cancelled before the delay elapsed
fn wait_unless_cancelled(delay: Duration, token: &CancellationToken) -> bool {
    let start = Instant::now();
    while start.elapsed() < delay {
        if token.is_cancelled() {
            return false;
        }
        thread::sleep(DELAY_SLICE.min(delay - start.elapsed().min(delay)));
    }
    !token.is_cancelled()
}

/// Handle to an in-flight engine search. Dropping it cancels the search.
pub struct PendingSearch {
    token: CancellationToken,
    receiver: Receiver<Result<SearchResult>>,
    handle: Option<JoinHandle<()>>,
    snapshot_fen: String,
    snapshot_ply: usize,
}

impl PendingSearch {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Whether this search was started from `game`'s current position
    pub fn is_for(&self, game: &ChessGame) -> bool {
        self.snapshot_ply == game.ply_count() && self.snapshot_fen == game.fen()
    }

    /// Result if the search has finished, without blocking
    pub fn try_result(&mut self) -> Option<Result<SearchResult>> {
        match self.receiver.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(self.worker_died()),
        }
    }

    /// Block until the search finishes
    pub fn wait(mut self) -> Result<SearchResult> {
        match self.receiver.recv() {
            Ok(outcome) => outcome,
            Err(_) => self.worker_died(),
        }
    }

    fn worker_died(&mut self) -> Result<SearchResult> {
        if let Some(handle) = self.handle.take() {
            if let Err(panic) = handle.join() {
                // A panicking search broke a search invariant; do not hide it
                std::panic::resume_unwind(panic);
            }
        }
        warn!("engine worker exited without a result");
        Err(EngineError::SearchCancelled)
    }
}

impl Drop for PendingSearch {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RulesEngine;
    use chess::{ChessMove, Square};

    #[test]
    fn test_worker_returns_best_move() {
        let game = ChessGame::from_fen("3rk3/8/8/8/3Q4/8/8/6K1 b - - 0 1").unwrap();
        let pending = EngineWorker::spawn(
            game.clone(),
            Evaluator::new(),
            SearchConfig::fast(),
            Color::Black,
            Duration::from_millis(5),
        );
        assert!(pending.is_for(&game));

        let result = pending.wait().unwrap();
        assert_eq!(
            result.best_move,
            Some(ChessMove::new(Square::D8, Square::D4, None))
        );
    }

    #[test]
    fn test_cancel_during_delay() {
        let game = ChessGame::new();
        let pending = EngineWorker::spawn(
            game,
            Evaluator::new(),
            SearchConfig::default(),
            Color::White,
            Duration::from_secs(5),
        );
        pending.cancel();
        assert!(pending.is_cancelled());
        assert!(matches!(pending.wait(), Err(EngineError::SearchCancelled)));
    }

    #[test]
    fn test_snapshot_goes_stale_after_move() {
        let mut game = ChessGame::new();
        let pending = EngineWorker::spawn(
            game.clone(),
            Evaluator::new(),
            SearchConfig::fast(),
            Color::White,
            Duration::from_millis(0),
        );
        let mv = game.legal_moves()[0];
        game.apply_move(mv).unwrap();
        assert!(!pending.is_for(&game));
    }
}
