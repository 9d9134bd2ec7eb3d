//! Error types for the router core.

/// The result type for fallible router operations.
pub type RouteResult<T> = Result<T, RouterError>;

/// Errors raised by the router.
///
/// The fatal kinds (`GraphBuild`, `ConflictingFixedRouting`,
/// `PartialLockedRoute`, `Config`) abort routing and surface to the caller.
/// `KernelOverflow` is recoverable: the driver aborts the affected slot and
/// reroutes the net through the serial fallback, so it never escapes
/// [`route`](crate::route).
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// The architecture reported malformed graph data.
    #[error("graph build error: {0}")]
    GraphBuild(String),

    /// A wire pre-bound to a locked net is already claimed by another net.
    #[error("conflicting fixed routing: wire index {wire} on net '{net}' is already bound")]
    ConflictingFixedRouting {
        /// Name of the locked net.
        net: String,
        /// Dense index of the contested wire.
        wire: u32,
    },

    /// A locked net is missing the expected wire for one of its sinks.
    #[error("combination of locked and incomplete routing on net '{net}' is unsupported")]
    PartialLockedRoute {
        /// Name of the locked net.
        net: String,
    },

    /// A device queue would exceed its capacity while expanding a net.
    #[error("device {queue} queue overflow while expanding net '{net}'")]
    KernelOverflow {
        /// Name of the net being expanded.
        net: String,
        /// Which queue overflowed.
        queue: &'static str,
    },

    /// The router configuration is inconsistent.
    #[error("invalid router configuration: {0}")]
    Config(String),
}
