use std::str::FromStr;

use chess::{Board, BoardStatus, ChessMove, MoveGen, Piece, Square};

use crate::models::move_record::MoveInput;

/// Outcome of applying a candidate move to a position.
#[derive(Debug, Clone)]
pub struct MoveVerdict {
    pub new_position: String,
    pub notation: String,
    pub is_check: bool,
    pub is_checkmate: bool,
    pub is_stalemate: bool,
    pub is_draw: bool,
}

impl MoveVerdict {
    pub fn is_terminal(&self) -> bool {
        self.is_checkmate || self.is_stalemate || self.is_draw
    }
}

#[derive(Debug)]
pub enum RulesError {
    IllegalMove(String),
    InvalidPosition(String),
    InvalidInput(String),
}

impl std::fmt::Display for RulesError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RulesError::IllegalMove(msg) => write!(f, "Illegal move: {}", msg),
            RulesError::InvalidPosition(msg) => write!(f, "Invalid position: {}", msg),
            RulesError::InvalidInput(msg) => write!(f, "Invalid move input: {}", msg),
        }
    }
}

impl std::error::Error for RulesError {}

/// Pure move validator: given an opaque position encoding and a candidate
/// move, either rejects it or returns the new position plus terminal flags.
pub trait RulesEngine: Send + Sync {
    fn apply_move(&self, position: &str, mv: &MoveInput) -> Result<MoveVerdict, RulesError>;
}

/// Rules engine backed by the `chess` crate, positions encoded as FEN.
#[derive(Clone)]
pub struct ChessRules;

impl ChessRules {
    pub fn new() -> Self {
        ChessRules
    }
}

impl Default for ChessRules {
    fn default() -> Self {
        Self::new()
    }
}

impl RulesEngine for ChessRules {
    fn apply_move(&self, position: &str, mv: &MoveInput) -> Result<MoveVerdict, RulesError> {
        let board = Board::from_str(position)
            .map_err(|e| RulesError::InvalidPosition(format!("Invalid FEN: {}", e)))?;

        if board.status() != BoardStatus::Ongoing {
            return Err(RulesError::IllegalMove("Game is already over".to_string()));
        }

        let from_sq = Square::from_str(&mv.from)
            .map_err(|_| RulesError::InvalidInput(format!("Invalid from square: {}", mv.from)))?;
        let to_sq = Square::from_str(&mv.to)
            .map_err(|_| RulesError::InvalidInput(format!("Invalid to square: {}", mv.to)))?;

        let promotion = match &mv.promotion {
            Some(p) => match p.as_str() {
                "q" => Some(Piece::Queen),
                "r" => Some(Piece::Rook),
                "b" => Some(Piece::Bishop),
                "n" => Some(Piece::Knight),
                _ => {
                    return Err(RulesError::InvalidInput(format!(
                        "Invalid promotion piece: {}",
                        p
                    )))
                }
            },
            None => None,
        };

        let chess_move = ChessMove::new(from_sq, to_sq, promotion);

        let mut legal_moves = MoveGen::new_legal(&board);
        if !legal_moves.any(|m| m == chess_move) {
            return Err(RulesError::IllegalMove(format!(
                "{} to {} is not legal",
                mv.from, mv.to
            )));
        }

        let mut new_board = board;
        board.make_move(chess_move, &mut new_board);

        let status = new_board.status();
        // The Board encoding carries no halfmove clock or history, so draws
        // here are stalemate and bare-kings insufficient material.
        let insufficient_material = new_board.combined().popcnt() == 2;

        Ok(MoveVerdict {
            new_position: format!("{}", new_board),
            notation: format!("{}-{}", mv.from, mv.to),
            is_check: new_board.checkers().popcnt() > 0 && status == BoardStatus::Ongoing,
            is_checkmate: status == BoardStatus::Checkmate,
            is_stalemate: status == BoardStatus::Stalemate,
            is_draw: status == BoardStatus::Ongoing && insufficient_material,
        })
    }
}
