//! Static position evaluation: material plus piece-square tables.
//!
//! Scores are centipawns from White's point of view. Every component is color
//! symmetric, so a color-swapped, vertically mirrored board scores the exact negation.

use chess::{Board, Color, Piece, Square};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 8x8 bonus table; row 0 is rank 8 seen from White's side, column 0 is the a-file
pub type SquareTable = [[i32; 8]; 8];

/// Centipawn base values for chess pieces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PieceValues {
    pub pawn: i32,
    pub knight: i32,
    pub bishop: i32,
    pub rook: i32,
    pub queen: i32,
    pub king: i32,
}

impl Default for PieceValues {
    fn default() -> Self {
        Self {
            pawn: 100,
            knight: 320,
            bishop: 330,
            rook: 500,
            queen: 900,
            king: 20000,
        }
    }
}

impl PieceValues {
    pub fn value(&self, piece: Piece) -> i32 {
        match piece {
            Piece::Pawn => self.pawn,
            Piece::Knight => self.knight,
            Piece::Bishop => self.bishop,
            Piece::Rook => self.rook,
            Piece::Queen => self.queen,
            Piece::King => self.king,
        }
    }
}

/// One positional table per piece type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PieceSquareTables {
    pub pawn: SquareTable,
    pub knight: SquareTable,
    pub bishop: SquareTable,
    pub rook: SquareTable,
    pub queen: SquareTable,
    pub king: SquareTable,
}

impl PieceSquareTables {
    pub fn table(&self, piece: Piece) -> &SquareTable {
        match piece {
            Piece::Pawn => &self.pawn,
            Piece::Knight => &self.knight,
            Piece::Bishop => &self.bishop,
            Piece::Rook => &self.rook,
            Piece::Queen => &self.queen,
            Piece::King => &self.king,
        }
    }

    /// Bonus for `piece` of `color` standing on `square` (Black reads the table mirrored)
    pub fn bonus(&self, piece: Piece, color: Color, square: Square) -> i32 {
        let rank = square.get_rank().to_index();
        let file = square.get_file().to_index();
        let row = match color {
            Color::White => 7 - rank,
            Color::Black => rank,
        };
        self.table(piece)[row][file]
    }
}

/// Classic simplified-evaluation tables
pub const PIECE_SQUARE_TABLES: PieceSquareTables = PieceSquareTables {
    pawn: [
        [0, 0, 0, 0, 0, 0, 0, 0],
        [50, 50, 50, 50, 50, 50, 50, 50],
        [10, 10, 20, 30, 30, 20, 10, 10],
        [5, 5, 10, 25, 25, 10, 5, 5],
        [0, 0, 0, 20, 20, 0, 0, 0],
        [5, -5, -10, 0, 0, -10, -5, 5],
        [5, 10, 10, -20, -20, 10, 10, 5],
        [0, 0, 0, 0, 0, 0, 0, 0],
    ],
    knight: [
        [-50, -40, -30, -30, -30, -30, -40, -50],
        [-40, -20, 0, 0, 0, 0, -20, -40],
        [-30, 0, 10, 15, 15, 10, 0, -30],
        [-30, 5, 15, 20, 20, 15, 5, -30],
        [-30, 0, 15, 20, 20, 15, 0, -30],
        [-30, 5, 10, 15, 15, 10, 5, -30],
        [-40, -20, 0, 5, 5, 0, -20, -40],
        [-50, -40, -30, -30, -30, -30, -40, -50],
    ],
    bishop: [
        [-20, -10, -10, -10, -10, -10, -10, -20],
        [-10, 0, 0, 0, 0, 0, 0, -10],
        [-10, 0, 5, 10, 10, 5, 0, -10],
        [-10, 5, 5, 10, 10, 5, 5, -10],
        [-10, 0, 10, 10, 10, 10, 0, -10],
        [-10, 10, 10, 10, 10, 10, 10, -10],
        [-10, 5, 0, 0, 0, 0, 5, -10],
        [-20, -10, -10, -10, -10, -10, -10, -20],
    ],
    rook: [
        [0, 0, 0, 0, 0, 0, 0, 0],
        [5, 10, 10, 10, 10, 10, 10, 5],
        [-5, 0, 0, 0, 0, 0, 0, -5],
        [-5, 0, 0, 0, 0, 0, 0, -5],
        [-5, 0, 0, 0, 0, 0, 0, -5],
        [-5, 0, 0, 0, 0, 0, 0, -5],
        [-5, 0, 0, 0, 0, 0, 0, -5],
        [0, 0, 0, 5, 5, 0, 0, 0],
    ],
    queen: [
        [-20, -10, -10, -5, -5, -10, -10, -20],
        [-10, 0, 0, 0, 0, 0, 0, -10],
        [-10, 0, 5, 5, 5, 5, 0, -10],
        [-5, 0, 5, 5, 5, 5, 0, -5],
        [0, 0, 5, 5, 5, 5, 0, -5],
        [-10, 5, 5, 5, 5, 5, 0, -10],
        [-10, 0, 5, 0, 0, 0, 0, -10],
        [-20, -10, -10, -5, -5, -10, -10, -20],
    ],
    king: [
        [-30, -40, -40, -50, -50, -40, -40, -30],
        [-30, -40, -40, -50, -50, -40, -40, -30],
        [-30, -40, -40, -50, -50, -40, -40, -30],
        [-30, -40, -40, -50, -50, -40, -40, -30],
        [-20, -30, -30, -40, -40, -30, -30, -20],
        [-10, -20, -20, -20, -20, -20, -20, -10],
        [20, 20, 0, 0, 0, 0, 20, 20],
        [20, 30, 10, 0, 0, 10, 30, 20],
    ],
};

/// A single additive term of the evaluation
pub trait EvaluationComponent: Send + Sync {
    /// Centipawns from White's perspective
    fn evaluate(&self, board: &Board) -> i32;
    fn component_name(&self) -> &'static str;
}

fn signed(color: Color, value: i32) -> i32 {
    match color {
        Color::White => value,
        Color::Black => -value,
    }
}

/// Material balance
#[derive(Debug, Clone)]
pub struct MaterialComponent {
    piece_values: PieceValues,
}

impl MaterialComponent {
    pub fn new(piece_values: PieceValues) -> Self {
        Self { piece_values }
    }
}

impl EvaluationComponent for MaterialComponent {
    fn evaluate(&self, board: &Board) -> i32 {
        let mut material = 0;
        for square in *board.combined() {
            if let (Some(piece), Some(color)) = (board.piece_on(square), board.color_on(square)) {
                material += signed(color, self.piece_values.value(piece));
            }
        }
        material
    }

    fn component_name(&self) -> &'static str {
        "Material"
    }
}

/// Piece placement through the piece-square tables
#[derive(Debug, Clone)]
pub struct PieceSquareComponent {
    tables: &'static PieceSquareTables,
}

impl PieceSquareComponent {
    pub fn new(tables: &'static PieceSquareTables) -> Self {
        Self { tables }
    }
}

impl Default for PieceSquareComponent {
    fn default() -> Self {
        Self::new(&PIECE_SQUARE_TABLES)
    }
}

impl EvaluationComponent for PieceSquareComponent {
    fn evaluate(&self, board: &Board) -> i32 {
        let mut placement = 0;
        for square in *board.combined() {
            if let (Some(piece), Some(color)) = (board.piece_on(square), board.color_on(square)) {
                placement += signed(color, self.tables.bonus(piece, color, square));
            }
        }
        placement
    }

    fn component_name(&self) -> &'static str {
        "Positional"
    }
}

/// Static evaluator used at search leaves
#[derive(Debug, Clone)]
pub struct Evaluator {
    material: MaterialComponent,
    positional: PieceSquareComponent,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    pub fn new() -> Self {
        Self::with_piece_values(PieceValues::default())
    }

    pub fn with_piece_values(piece_values: PieceValues) -> Self {
        Self {
            material: MaterialComponent::new(piece_values),
            positional: PieceSquareComponent::default(),
        }
    }

    /// Centipawns, positive favoring White
    pub fn evaluate(&self, board: &Board) -> i32 {
        self.material.evaluate(board) + self.positional.evaluate(board)
    }

    /// Evaluation split into its components
    pub fn evaluate_detailed(&self, board: &Board) -> EvaluationBreakdown {
        let mut breakdown = EvaluationBreakdown::default();
        let components: [&dyn EvaluationComponent; 2] = [&self.material, &self.positional];
        for component in components {
            let value = component.evaluate(board);
            breakdown
                .components
                .insert(component.component_name().to_string(), value);
            breakdown.total += value;
        }
        breakdown
    }
}

/// Detailed evaluation breakdown for analysis
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationBreakdown {
    pub components: BTreeMap<String, i32>,
    pub total: i32,
}

impl EvaluationBreakdown {
    pub fn display(&self) -> String {
        let mut result = String::new();
        result.push_str(&format!("Total: {} cp\n", self.total));
        result.push_str("Breakdown:\n");

        for (component, value) in &self.components {
            result.push_str(&format!("  {}: {} cp\n", component, value));
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    /// Swap colors and flip the board vertically
    fn mirror(fen: &str) -> Board {
        let fields: Vec<&str> = fen.split_whitespace().collect();
        let placement: Vec<String> = fields[0]
            .split('/')
            .rev()
            .map(|rank| {
                rank.chars()
                    .map(|c| {
                        if c.is_ascii_uppercase() {
                            c.to_ascii_lowercase()
                        } else {
                            c.to_ascii_uppercase()
                        }
                    })
                    .collect()
            })
            .collect();
        let side = if fields[1] == "w" { "b" } else { "w" };
        Board::from_str(&format!("{} {} - - 0 1", placement.join("/"), side)).unwrap()
    }

    #[test]
    fn test_start_position_is_balanced() {
        let evaluator = Evaluator::new();
        assert_eq!(evaluator.evaluate(&Board::default()), 0);
    }

    #[test]
    fn test_material_component() {
        let component = MaterialComponent::new(PieceValues::default());
        // Black is missing the g8 knight
        let board =
            Board::from_str("rnbqkb1r/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1").unwrap();
        assert_eq!(component.evaluate(&board), 320);
    }

    #[test]
    fn test_piece_square_lookup_is_mirrored() {
        let tables = &PIECE_SQUARE_TABLES;
        assert_eq!(tables.bonus(Piece::Knight, Color::White, Square::E4), 20);
        assert_eq!(tables.bonus(Piece::Knight, Color::Black, Square::E5), 20);
        assert_eq!(tables.bonus(Piece::Pawn, Color::White, Square::D2), -20);
        assert_eq!(tables.bonus(Piece::Pawn, Color::Black, Square::D7), -20);
        assert_eq!(tables.bonus(Piece::King, Color::White, Square::G1), 30);
        assert_eq!(tables.bonus(Piece::King, Color::Black, Square::G8), 30);
    }

    #[test]
    fn test_central_knight_preferred() {
        let evaluator = Evaluator::new();
        let developed =
            Board::from_str("rnbqkbnr/pppppppp/8/8/8/5N2/PPPPPPPP/RNBQKB1R b KQkq - 1 1").unwrap();
        let rim =
            Board::from_str("rnbqkbnr/pppppppp/8/8/8/7N/PPPPPPPP/RNBQKB1R b KQkq - 1 1").unwrap();
        assert!(evaluator.evaluate(&developed) > evaluator.evaluate(&rim));
        assert_eq!(evaluator.evaluate(&developed), 50);
    }

    #[test]
    fn test_color_mirror_negates_score() {
        let evaluator = Evaluator::new();
        let fens = [
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1",
            "r1bqkb1r/pppp1ppp/2n2n2/4p3/2B1P3/5N2/PPPP1PPP/RNBQK2R w KQkq - 4 4",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
            "6k1/5ppp/8/3q4/8/8/5PPP/3R2K1 w - - 0 1",
        ];
        for fen in fens {
            let board = Board::from_str(fen).unwrap();
            let mirrored = mirror(fen);
            assert_eq!(
                evaluator.evaluate(&mirrored),
                -evaluator.evaluate(&board),
                "mirror symmetry broken for {fen}"
            );
        }
    }

    #[test]
    fn test_detailed_breakdown() {
        let evaluator = Evaluator::new();
        let board =
            Board::from_str("rnbqkb1r/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1").unwrap();
        let breakdown = evaluator.evaluate_detailed(&board);
        assert_eq!(breakdown.components["Material"], 320);
        assert_eq!(breakdown.total, evaluator.evaluate(&board));
        assert!(breakdown.display().contains("Positional"));
    }

    #[test]
    fn test_custom_piece_values() {
        let values = PieceValues {
            knight: 300,
            ..PieceValues::default()
        };
        let evaluator = Evaluator::with_piece_values(values);
        let board =
            Board::from_str("rnbqkb1r/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1").unwrap();
        let breakdown = evaluator.evaluate_detailed(&board);
        assert_eq!(breakdown.components["Material"], 300);
    }
}
