/// Classification for retry policy.
///
/// Used to determine how the transport and the request executor respond to
/// errors raised while fetching.
///
/// # Behavior Summary
///
/// | Class | Transport Retries? | Sibling Symbols Continue? |
/// |-------|--------------------|---------------------------|
/// | `Never` | No | No (batch aborts) |
/// | `WithBackoff` | Yes | Yes (if retries exhaust) |
/// | `SkipSymbol` | No | Yes |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Never retry - bad query, missing credential, or terminal failure.
    /// The request is fundamentally invalid and retrying won't help.
    Never,

    /// Retry the same request with exponential backoff.
    ///
    /// Used for transient errors like rate limiting (429) or timeout.
    /// The transport retries a bounded number of times; if the error
    /// persists it degrades to a symbol-local failure.
    WithBackoff,

    /// Give up on the affected symbol without penalizing the batch.
    ///
    /// Used when the vendor can't serve this symbol (server error,
    /// undecodable payload). The symbol contributes zero rows, a warning is
    /// emitted, and the other symbols' tasks proceed.
    SkipSymbol,
}
