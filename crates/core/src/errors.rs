use thiserror::Error;

/// Storage-side failures surfaced by a [`crate::Catalog`] implementation.
///
/// The orchestrator never lets either variant reach the caller: both degrade
/// to the popularity fallback, or to an empty result when the fallback itself
/// cannot be computed.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("stored row could not be decoded: {0}")]
    Decode(String),
}

/// Failure modes of the best-effort LLM ranking tier.
///
/// Every variant is handled identically by the orchestrator (log and fall
/// back); the distinction exists for observability, not control flow.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RankerError {
    #[error("ranker endpoint unavailable: {0}")]
    Unavailable(String),
    #[error("ranking request timed out")]
    Timeout,
    #[error("malformed ranker response: {0}")]
    MalformedResponse(String),
    #[error("parsed {parsed} valid ids but at least {required} are required")]
    InsufficientConfidence { parsed: usize, required: usize },
    #[error("{have} candidates cannot satisfy a ranking of {need}")]
    TooFewCandidates { have: usize, need: usize },
}
