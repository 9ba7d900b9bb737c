use thiserror::Error;

/// Errors surfaced by the rules engine, the session orchestrator and configuration loading.
///
/// The search itself never fails on its own: the only error it can produce is
/// [`EngineError::SearchCancelled`]. Broken make/unmake pairing inside a search is a
/// programming error and panics instead of being reported here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The rules engine rejected a move that is not legal in the current position
    #[error("Illegal move {mv} in position {fen}")]
    IllegalMove { mv: String, fen: String },

    /// `undo` was called with an empty history
    #[error("Nothing to undo")]
    NothingToUndo,

    /// FEN text could not be parsed into a position
    #[error("Invalid position: {0}")]
    InvalidPosition(String),

    /// Square name outside a1..h8
    #[error("Invalid square: {0}")]
    InvalidSquare(String),

    /// Move text that is neither coordinate notation nor SAN for this position
    #[error("Invalid move text '{text}': {reason}")]
    InvalidMoveText { text: String, reason: String },

    /// Move requested after checkmate or a draw
    #[error("Game is over: {0}")]
    GameOver(String),

    /// Human tried to move while the engine is to move
    #[error("It is not the human player's turn")]
    NotYourTurn,

    /// Root selector asked to choose for a side that is not to move
    #[error("Cannot select a move for {requested}: {to_move} is to move")]
    WrongSideToMove { requested: String, to_move: String },

    /// Cooperative cancellation flag was raised while searching
    #[error("Search cancelled")]
    SearchCancelled,

    /// Configuration value outside its allowed range
    #[error("Validation failed for field '{field}': got '{value}', expected {expected}")]
    Configuration {
        field: String,
        value: String,
        expected: String,
    },

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON (de)serialization failed
    #[error("JSON serialization error: {0}")]
    Json(String),
}

// Convenience type alias
pub type Result<T> = std::result::Result<T, EngineError>;

// Convert from common error types
impl From<std::io::Error> for EngineError {
    fn from(error: std::io::Error) -> Self {
        EngineError::Io(error.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(error: serde_json::Error) -> Self {
        EngineError::Json(error.to_string())
    }
}

impl From<chess::Error> for EngineError {
    fn from(error: chess::Error) -> Self {
        EngineError::InvalidPosition(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::IllegalMove {
            mv: "e2e5".to_string(),
            fen: "start".to_string(),
        };
        assert_eq!(err.to_string(), "Illegal move e2e5 in position start");

        let err = EngineError::Configuration {
            field: "depth".to_string(),
            value: "12".to_string(),
            expected: "0..=6".to_string(),
        };
        assert!(err.to_string().contains("depth"));
        assert!(err.to_string().contains("0..=6"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.json");
        let err: EngineError = io.into();
        assert!(matches!(err, EngineError::Io(msg) if msg.contains("missing.json")));
    }

    #[test]
    fn test_json_conversion() {
        let parse = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: EngineError = parse.into();
        assert!(matches!(err, EngineError::Json(_)));
    }
}
