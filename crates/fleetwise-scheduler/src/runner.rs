use std::future::Future;

use futures_util::stream::{self, StreamExt};

/// Run `thunks` with at most `limit` in flight at once.
///
/// A thunk is only invoked once a slot is free. Outputs come back in
/// completion order, not submission order. The call resolves after every
/// thunk has settled and never fails as a whole; failures are ordinary
/// `Result` outputs for the caller to inspect. A `limit` of 0 is treated as 1.
pub async fn run_bounded<I, F, Fut, T>(thunks: I, limit: usize) -> Vec<T>
where
    I: IntoIterator<Item = F>,
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    stream::iter(thunks)
        .map(|thunk| thunk())
        .buffer_unordered(limit.max(1))
        .collect()
        .await
}
