use thiserror::Error;

/// Schema violation, unknown `next`, mutually-exclusive combinators. Fatal
/// at load.
#[derive(Debug, Error)]
pub enum PieceValidationError {
    #[error("piece {piece}: initial_movement {name:?} names no movement")]
    UnknownInitialMovement { piece: String, name: String },

    #[error("piece {piece}, movement {movement}: rule[{rule_index}].next {target:?} names no movement and is not COMPLETE/ABORT")]
    UnknownRuleTarget {
        piece: String,
        movement: String,
        rule_index: usize,
        target: String,
    },

    #[error("piece {piece}, movement {movement}: parallel, arpeggio, and team_leader are mutually exclusive")]
    ConflictingCombinators { piece: String, movement: String },

    #[error("piece {piece}, movement {movement}: output_contracts is empty but rule[{rule_index}] is tag-based")]
    TagRuleWithoutOutputContract {
        piece: String,
        movement: String,
        rule_index: usize,
    },

    #[error("piece {piece}, movement {movement}: more than one rule omits `next`")]
    MultipleRulesWithoutNext { piece: String, movement: String },

    #[error("piece {piece}, movement {movement}: team_leader.max_parts {max_parts} exceeds the cap of 3")]
    TeamLeaderMaxPartsExceeded { piece: String, movement: String, max_parts: u32 },
}

/// Piece identifier cannot be located. Surfaced to caller; never retried.
#[derive(Debug, Error)]
pub enum PieceResolutionError {
    #[error("piece {0:?} not found in package-local, project, user, or builtin layers")]
    NotFound(String),

    #[error("failed to read piece file {path}: {source}")]
    Io { path: String, source: std::io::Error },

    #[error("failed to parse piece file {path}: {source}")]
    Yaml { path: String, source: serde_yaml::Error },
}
