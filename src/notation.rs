//! Standard algebraic notation for display and move text parsing.

use crate::errors::{EngineError, Result};
use chess::{Board, BoardStatus, ChessMove, MoveGen, Piece, Square};

/// Square name such as `e4`
pub fn square_name(square: Square) -> String {
    format!("{}{}", file_char(square), rank_char(square))
}

fn file_char(square: Square) -> char {
    (b'a' + square.get_file().to_index() as u8) as char
}

fn rank_char(square: Square) -> char {
    (b'1' + square.get_rank().to_index() as u8) as char
}

/// Upper-case SAN letter for a piece
pub fn piece_letter(piece: Piece) -> char {
    match piece {
        Piece::Pawn => 'P',
        Piece::Knight => 'N',
        Piece::Bishop => 'B',
        Piece::Rook => 'R',
        Piece::Queen => 'Q',
        Piece::King => 'K',
    }
}

/// SAN for a legal move in `board` (`Nf3`, `exd5`, `O-O`, `e8=Q+`, `Qh4#`)
pub fn san(board: &Board, mv: ChessMove) -> String {
    let source = mv.get_source();
    let dest = mv.get_dest();
    let piece = match board.piece_on(source) {
        Some(piece) => piece,
        None => return mv.to_string(),
    };

    let file_distance =
        (source.get_file().to_index() as i32 - dest.get_file().to_index() as i32).abs();

    let mut text = String::new();
    if piece == Piece::King && file_distance == 2 {
        if dest.get_file().to_index() > source.get_file().to_index() {
            text.push_str("O-O");
        } else {
            text.push_str("O-O-O");
        }
    } else {
        let capture = board.piece_on(dest).is_some() || (piece == Piece::Pawn && file_distance != 0);

        if piece == Piece::Pawn {
            if capture {
                text.push(file_char(source));
            }
        } else {
            text.push(piece_letter(piece));
            text.push_str(&disambiguation(board, mv, piece));
        }

        if capture {
            text.push('x');
        }
        text.push_str(&square_name(dest));

        if let Some(promotion) = mv.get_promotion() {
            text.push('=');
            text.push(piece_letter(promotion));
        }
    }

    let after = board.make_move_new(mv);
    if after.status() == BoardStatus::Checkmate {
        text.push('#');
    } else if after.checkers().popcnt() > 0 {
        text.push('+');
    }

    text
}

fn disambiguation(board: &Board, mv: ChessMove, piece: Piece) -> String {
    let source = mv.get_source();
    let rivals: Vec<Square> = MoveGen::new_legal(board)
        .filter(|other| {
            other.get_dest() == mv.get_dest()
                && other.get_source() != source
                && board.piece_on(other.get_source()) == Some(piece)
        })
        .map(|other| other.get_source())
        .collect();

    if rivals.is_empty() {
        return String::new();
    }

    let shares_file = rivals.iter().any(|sq| sq.get_file() == source.get_file());
    let shares_rank = rivals.iter().any(|sq| sq.get_rank() == source.get_rank());

    if !shares_file {
        file_char(source).to_string()
    } else if !shares_rank {
        rank_char(source).to_string()
    } else {
        square_name(source)
    }
}

fn normalize(text: &str) -> String {
    text.trim()
        .trim_end_matches(['+', '#', '!', '?'])
        .replace('0', "O")
        .replace('=', "")
}

/// Resolve coordinate notation (`e2e4`, `e2-e4`, `e7e8q`) or SAN against `legal_moves`.
///
/// A pawn move onto the last rank without a promotion letter resolves to the queen
/// promotion.
pub fn parse_move(board: &Board, legal_moves: &[ChessMove], text: &str) -> Result<ChessMove> {
    let invalid = |reason: &str| EngineError::InvalidMoveText {
        text: text.to_string(),
        reason: reason.to_string(),
    };

    let compact: String = text.trim().chars().filter(|c| *c != '-').collect();
    let lower = compact.to_ascii_lowercase();
    if (lower.len() == 4 || lower.len() == 5) && lower.is_ascii() {
        if let (Ok(source), Ok(dest)) = (
            crate::rules::parse_square(&lower[0..2]),
            crate::rules::parse_square(&lower[2..4]),
        ) {
            let promotion = match lower.chars().nth(4) {
                None => None,
                Some('q') => Some(Piece::Queen),
                Some('r') | Some('b') | Some('n') => {
                    return Err(invalid("only queen promotions are supported"))
                }
                Some(_) => return Err(invalid("unknown promotion piece")),
            };

            return legal_moves
                .iter()
                .copied()
                .find(|mv| {
                    mv.get_source() == source
                        && mv.get_dest() == dest
                        && (promotion.is_none() || mv.get_promotion() == promotion)
                })
                .ok_or_else(|| invalid("not a legal move in this position"));
        }
    }

    let wanted = normalize(text);
    if wanted.is_empty() {
        return Err(invalid("empty move"));
    }

    legal_moves
        .iter()
        .copied()
        .find(|mv| normalize(&san(board, *mv)) == wanted)
        .ok_or_else(|| invalid("no legal move matches"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn legal(board: &Board) -> Vec<ChessMove> {
        MoveGen::new_legal(board).collect()
    }

    #[test]
    fn test_basic_san() {
        let board = Board::default();
        assert_eq!(san(&board, ChessMove::new(Square::E2, Square::E4, None)), "e4");
        assert_eq!(san(&board, ChessMove::new(Square::G1, Square::F3, None)), "Nf3");
    }

    #[test]
    fn test_capture_and_check_suffix() {
        let board =
            Board::from_str("rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2")
                .unwrap();
        assert_eq!(san(&board, ChessMove::new(Square::E4, Square::D5, None)), "exd5");

        let board =
            Board::from_str("rnbqkbnr/ppppp2p/5p2/6p1/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 3")
                .unwrap();
        assert_eq!(san(&board, ChessMove::new(Square::D1, Square::H5, None)), "Qh5#");
    }

    #[test]
    fn test_castling_and_promotion() {
        let board = Board::from_str("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        assert_eq!(san(&board, ChessMove::new(Square::E1, Square::G1, None)), "O-O");
        assert_eq!(san(&board, ChessMove::new(Square::E1, Square::C1, None)), "O-O-O");

        let board = Board::from_str("8/P6k/8/8/8/8/8/K7 w - - 0 1").unwrap();
        assert_eq!(
            san(&board, ChessMove::new(Square::A7, Square::A8, Some(Piece::Queen))),
            "a8=Q"
        );
    }

    #[test]
    fn test_disambiguation() {
        // Knights on b1 and f3 can both reach d2
        let board = Board::from_str("4k3/8/8/8/8/5N2/8/1N2K3 w - - 0 1").unwrap();
        assert_eq!(san(&board, ChessMove::new(Square::B1, Square::D2, None)), "Nbd2");

        // Rooks on a1 and a5 share a file
        let board = Board::from_str("4k3/8/8/R7/8/8/8/R3K3 w - - 0 1").unwrap();
        assert_eq!(san(&board, ChessMove::new(Square::A1, Square::A3, None)), "R1a3");
    }

    #[test]
    fn test_parse_coordinate_and_san() {
        let board = Board::default();
        let moves = legal(&board);
        let e4 = ChessMove::new(Square::E2, Square::E4, None);
        assert_eq!(parse_move(&board, &moves, "e2e4").unwrap(), e4);
        assert_eq!(parse_move(&board, &moves, "e2-e4").unwrap(), e4);
        assert_eq!(parse_move(&board, &moves, "e4").unwrap(), e4);
        assert_eq!(
            parse_move(&board, &moves, "Nf3").unwrap(),
            ChessMove::new(Square::G1, Square::F3, None)
        );
        assert!(parse_move(&board, &moves, "e2e5").is_err());
        assert!(parse_move(&board, &moves, "Qd4").is_err());
        assert!(parse_move(&board, &moves, "").is_err());
    }

    #[test]
    fn test_parse_promotion_defaults_to_queen() {
        let board = Board::from_str("8/P6k/8/8/8/8/8/K7 w - - 0 1").unwrap();
        let moves: Vec<ChessMove> = legal(&board)
            .into_iter()
            .filter(|m| matches!(m.get_promotion(), None | Some(Piece::Queen)))
            .collect();
        let queen = ChessMove::new(Square::A7, Square::A8, Some(Piece::Queen));
        assert_eq!(parse_move(&board, &moves, "a7a8").unwrap(), queen);
        assert_eq!(parse_move(&board, &moves, "a7a8q").unwrap(), queen);
        assert_eq!(parse_move(&board, &moves, "a8=Q").unwrap(), queen);
        assert!(parse_move(&board, &moves, "a7a8n").is_err());
    }
}
