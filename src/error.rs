use thiserror::Error as ThisError;

pub type Result<T> = std::result::Result<T, Error>;

/// Validation failures surfaced by the counter.
///
/// Every variant is a deterministic caller error: there is nothing transient
/// to retry, and no partial state is left behind when one is returned.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum Error {
    #[error("max timespan must be greater than zero")]
    InvalidTimespan,
    #[error("number of events must be greater than zero")]
    InvalidEventCount,
    #[error("requested window of {requested} seconds is outside the valid range [1, {max}]")]
    WindowOutOfRange { requested: u64, max: u64 },
}
