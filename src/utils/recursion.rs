//! Bounded nesting depth for recursive decoders.
//!
//! Blob encodings are recursive: a pointer wraps a type, a generic instantiation carries
//! type arguments, a function pointer embeds a whole signature, a boxed custom attribute
//! argument carries another argument. All of that nesting is attacker-controlled, so every
//! recursive entry point goes through a [`RecursionCounter`] before descending.
//!
//! Each decode call owns a fresh counter. [`RecursionCounter::enter`] fails once the
//! ceiling is reached; a successful `enter` must be paired with a [`RecursionCounter::leave`]
//! on every exit path. Decoders keep that pairing by routing recursion through a small
//! helper that always calls `leave` after the nested closure returns, whether it succeeded
//! or not.

use crate::{Error::RecursionLimit, Result};

/// Default ceiling on the nesting depth of a single decode call.
pub const MAX_RECURSION_DEPTH: usize = 100;

/// Per-decode nesting depth counter.
///
/// # Examples
///
/// ```rust
/// use cilblob::utils::RecursionCounter;
///
/// let mut counter = RecursionCounter::with_limit(2);
/// counter.enter()?;
/// counter.enter()?;
/// assert!(counter.enter().is_err());
///
/// counter.leave();
/// assert_eq!(counter.depth(), 1);
/// # Ok::<(), cilblob::Error>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecursionCounter {
    depth: usize,
    limit: usize,
}

impl RecursionCounter {
    /// A counter with the default ceiling of [`MAX_RECURSION_DEPTH`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_limit(MAX_RECURSION_DEPTH)
    }

    /// A counter with a custom ceiling.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        RecursionCounter { depth: 0, limit }
    }

    /// Enter one nesting level.
    ///
    /// # Errors
    /// Returns [`crate::Error::RecursionLimit`] if the ceiling has been reached. The depth is
    /// left unchanged in that case, so no matching [`RecursionCounter::leave`] is due.
    pub fn enter(&mut self) -> Result<()> {
        if self.depth >= self.limit {
            log::trace!("recursion ceiling of {} reached", self.limit);
            return Err(RecursionLimit(self.limit));
        }

        self.depth += 1;
        Ok(())
    }

    /// Leave one nesting level.
    pub fn leave(&mut self) {
        debug_assert!(self.depth > 0, "unbalanced RecursionCounter::leave");
        self.depth = self.depth.saturating_sub(1);
    }

    /// Current nesting depth.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The configured ceiling.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl Default for RecursionCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn enter_until_ceiling() {
        let mut counter = RecursionCounter::new();
        for _ in 0..MAX_RECURSION_DEPTH {
            counter.enter().unwrap();
        }
        assert_eq!(counter.depth(), MAX_RECURSION_DEPTH);
        assert!(matches!(
            counter.enter(),
            Err(Error::RecursionLimit(MAX_RECURSION_DEPTH))
        ));
        assert_eq!(counter.depth(), MAX_RECURSION_DEPTH);
    }

    #[test]
    fn leave_restores_capacity() {
        let mut counter = RecursionCounter::with_limit(1);
        counter.enter().unwrap();
        assert!(counter.enter().is_err());
        counter.leave();
        assert_eq!(counter.depth(), 0);
        counter.enter().unwrap();
    }

    #[test]
    fn zero_limit_rejects_everything() {
        let mut counter = RecursionCounter::with_limit(0);
        assert!(counter.enter().is_err());
    }
}
