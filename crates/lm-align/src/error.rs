use thiserror::Error;

#[derive(Error, Debug)]
pub enum AlignError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("{table} table has no header row")]
    MissingHeader { table: &'static str },
    #[error("line {line}: expected {expected} fields, got {got}")]
    RaggedRow {
        line: usize,
        expected: usize,
        got: usize,
    },
    #[error("{table} table needs at least {needed} columns, got {got}")]
    TooFewColumns {
        table: &'static str,
        needed: usize,
        got: usize,
    },
}

pub type Result<T> = std::result::Result<T, AlignError>;
