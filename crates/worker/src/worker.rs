//! The worker side of the admin protocol.

/// A running worker that admin commands act on.
///
/// The poll loop that pops and runs jobs lives outside this crate; it only
/// has to expose the controls below. Methods take `&self` because a listener
/// thread drives them while the worker keeps running.
pub trait Worker: Send + Sync {
    /// Name the worker registers under, e.g. `host:pid:queues`.
    fn name(&self) -> &str;

    /// Pause (`true`) or resume (`false`) popping jobs.
    fn toggle_pause(&self, paused: bool);

    /// Whether the worker is paused.
    fn is_paused(&self) -> bool;

    /// Stop the worker. With `now`, interrupt the running job; otherwise
    /// finish it first.
    fn end(&self, now: bool);
}
