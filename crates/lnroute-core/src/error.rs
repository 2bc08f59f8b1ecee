/// Errors raised while parsing identifiers or doing amount arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("invalid node id: {0}")]
    InvalidNodeId(String),

    #[error("invalid short channel id: {0}")]
    InvalidShortChannelId(String),

    #[error("invalid channel direction {0}, expected 0 or 1")]
    InvalidDirection(u8),

    #[error("amount overflow in {0}")]
    AmountOverflow(&'static str),
}
