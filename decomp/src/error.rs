use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum DecompError {
    #[error("alphabet must contain at least one element")]
    EmptyAlphabet,

    #[error("unknown element symbol: {0}")]
    UnknownElement(String),

    #[error("expect positive mass for decomposition, got {0}")]
    InvalidMass(f64),

    #[error("invalid bound for element {symbol}: min {min} > max {max}")]
    InvalidBounds { symbol: String, min: i64, max: i64 },

    #[error("integer mass grid overflow while building the residue table, adjust the precision")]
    Overflow,
}
