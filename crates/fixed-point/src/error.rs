use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MathError {
    #[error("Arithmetic overflow in {0}")]
    Overflow(&'static str),

    #[error("Arithmetic underflow in {0}")]
    Underflow(&'static str),

    #[error("Division by zero in {0}")]
    DivisionByZero(&'static str),

    #[error("Tick {0} is outside the supported range")]
    TickOutOfBounds(i32),

    #[error("Value does not fit in 128 bits: {0}")]
    Narrowing(String),
}
