//! Error taxonomy shared by the ledger core and the HTTP adapter.

use thiserror::Error;

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// Request-scoped errors. None is retried internally and none is fatal to
/// the process; the HTTP layer maps them to status codes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Malformed or out-of-range caller arguments.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Unknown identifier or symbol.
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation illegal for the current lifecycle state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// No market data observed for the symbol. The query layer degrades
    /// this to a null pnl instead of failing the read.
    #[error("price unavailable for {0}")]
    PriceUnavailable(String),
}
