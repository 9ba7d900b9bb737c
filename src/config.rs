//! Engine and session configuration, loadable from JSON.

use crate::errors::{EngineError, Result};
use crate::evaluation::PieceValues;
use crate::search::{SearchConfig, MATE_SCORE};
use chess::Color;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Largest non-king material a side may reach, kept well below the mate score
pub const MATERIAL_CEILING: i64 = MATE_SCORE as i64 / 2;

/// Nine queens after promoting every pawn, plus the starting rooks and minors
fn max_material(values: &PieceValues) -> i64 {
    9 * values.queen as i64
        + 2 * (values.rook as i64 + values.bishop as i64 + values.knight as i64)
}

/// Side played by the human
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerColor {
    White,
    Black,
}

impl From<PlayerColor> for Color {
    fn from(color: PlayerColor) -> Self {
        match color {
            PlayerColor::White => Color::White,
            PlayerColor::Black => Color::Black,
        }
    }
}

impl FromStr for PlayerColor {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "w" | "white" => Ok(PlayerColor::White),
            "b" | "black" => Ok(PlayerColor::Black),
            other => Err(EngineError::Configuration {
                field: "human_color".to_string(),
                value: other.to_string(),
                expected: "white or black".to_string(),
            }),
        }
    }
}

impl fmt::Display for PlayerColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerColor::White => write!(f, "white"),
            PlayerColor::Black => write!(f, "black"),
        }
    }
}

/// Everything a game session needs to know about its engine opponent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub search: SearchConfig,
    pub human_color: PlayerColor,
    /// Pause before the engine starts thinking, so the human move is shown first
    pub engine_delay_ms: u64,
    pub piece_values: PieceValues,
    /// Seed for the fallback move RNG; `None` seeds from entropy
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            search: SearchConfig::default(),
            human_color: PlayerColor::White,
            engine_delay_ms: 250,
            piece_values: PieceValues::default(),
            seed: None,
        }
    }
}

impl EngineConfig {
    /// Browser-game behavior: human plays White, static leaf scoring
    pub fn reference() -> Self {
        Self {
            search: SearchConfig::reference(),
            ..Self::default()
        }
    }

    pub fn engine_color(&self) -> Color {
        !Color::from(self.human_color)
    }

    pub fn validate(&self) -> Result<()> {
        self.search.validate()?;
        let values = &self.piece_values;
        if values.pawn <= 0 || values.queen <= values.pawn {
            return Err(EngineError::Configuration {
                field: "piece_values".to_string(),
                value: format!("{values:?}"),
                expected: "positive pawn value below the queen value".to_string(),
            });
        }
        if [values.knight, values.bishop, values.rook].iter().any(|v| *v <= 0) {
            return Err(EngineError::Configuration {
                field: "piece_values".to_string(),
                value: format!("{values:?}"),
                expected: "positive minor and rook values".to_string(),
            });
        }
        // A checkmate must outweigh any material one side can hold
        if max_material(values) > MATERIAL_CEILING {
            return Err(EngineError::Configuration {
                field: "piece_values".to_string(),
                value: format!("{values:?}"),
                expected: format!("at most {MATERIAL_CEILING} cp of non-king material per side"),
            });
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_json_string()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::TerminalScoring;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.search.depth, 2);
        assert_eq!(config.engine_delay_ms, 250);
        assert_eq!(config.engine_color(), Color::Black);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config =
            EngineConfig::from_json_str(r#"{"human_color": "black", "search": {"depth": 3}}"#)
                .unwrap();
        assert_eq!(config.human_color, PlayerColor::Black);
        assert_eq!(config.search.depth, 3);
        assert_eq!(config.search.terminal_scoring, TerminalScoring::Decisive);
        assert_eq!(config.engine_color(), Color::White);
    }

    #[test]
    fn test_invalid_depth_rejected() {
        let result = EngineConfig::from_json_str(r#"{"search": {"depth": 40}}"#);
        assert!(matches!(result, Err(EngineError::Configuration { .. })));
    }

    #[test]
    fn test_piece_values_must_stay_below_mate() {
        let config = EngineConfig {
            piece_values: PieceValues {
                queen: 200_000,
                ..PieceValues::default()
            },
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(EngineError::Configuration { ref field, .. }) if field == "piece_values"
        ));

        let json = r#"{"piece_values": {"pawn": 100, "knight": 320, "bishop": 330,
            "rook": 500, "queen": 9000, "king": 20000}}"#;
        assert!(matches!(
            EngineConfig::from_json_str(json),
            Err(EngineError::Configuration { .. })
        ));
        assert!(max_material(&PieceValues::default()) < MATERIAL_CEILING);
    }

    #[test]
    fn test_non_positive_piece_value_rejected() {
        let config = EngineConfig {
            piece_values: PieceValues {
                knight: 0,
                ..PieceValues::default()
            },
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        let config = EngineConfig {
            seed: Some(42),
            ..EngineConfig::reference()
        };
        config.save(&path).unwrap();
        assert_eq!(EngineConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = EngineConfig::load("/definitely/not/here.json");
        assert!(matches!(result, Err(EngineError::Io(_))));
    }

    #[test]
    fn test_player_color_parsing() {
        assert_eq!("White".parse::<PlayerColor>().unwrap(), PlayerColor::White);
        assert_eq!("b".parse::<PlayerColor>().unwrap(), PlayerColor::Black);
        assert!("green".parse::<PlayerColor>().is_err());
    }
}
