//! Non-error outcomes of schedule and queue operations.

/// Outcome of an operation that can legitimately leave state untouched.
///
/// `Unchanged` is a control-flow signal, not a failure: a push into a full
/// [`FifoQueue`](crate::core::FifoQueue) returns it and the producer decides
/// whether to retry, back off, or wait on the low-watermark condition.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// The operation took effect.
    Ok,
    /// The operation was a well-defined no-op.
    Unchanged,
}

impl Status {
    /// Whether the operation took effect.
    #[inline]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Whether the operation left state untouched.
    #[inline]
    pub const fn is_unchanged(self) -> bool {
        matches!(self, Self::Unchanged)
    }
}
