//! Thread-local differentiation mode.
//!
//! Every tracked operation reads the mode once, when it runs. Overrides are
//! scoped: [`with_mode`] installs a [`ModeGuard`] that restores the previous
//! mode when dropped, so the prior state comes back on normal return, on an
//! early `?` return inside the closure, and during unwinding.

use std::cell::Cell;

/// Which differentiation passes operations participate in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradMode {
    /// Master switch. When false nothing is tracked.
    pub enabled: bool,
    /// Record operation nodes for a later backward pass.
    pub reverse: bool,
    /// Propagate tangents as operations execute.
    pub forward: bool,
}

impl GradMode {
    /// Tracking on, reverse mode only.
    pub const fn reverse_only() -> Self {
        Self {
            enabled: true,
            reverse: true,
            forward: false,
        }
    }

    /// Tracking on, forward mode only.
    pub const fn forward_only() -> Self {
        Self {
            enabled: true,
            reverse: false,
            forward: true,
        }
    }

    /// Nothing is tracked.
    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            reverse: false,
            forward: false,
        }
    }

    /// Whether nodes should be recorded.
    pub fn records_nodes(&self) -> bool {
        self.enabled && self.reverse
    }

    /// Whether tangents should be propagated.
    pub fn propagates_tangents(&self) -> bool {
        self.enabled && self.forward
    }
}

impl Default for GradMode {
    fn default() -> Self {
        Self::reverse_only()
    }
}

thread_local! {
    static MODE: Cell<GradMode> = const { Cell::new(GradMode::reverse_only()) };
}

/// The mode in effect on this thread.
pub fn current_mode() -> GradMode {
    MODE.with(Cell::get)
}

/// Whether any tracking is enabled on this thread.
pub fn is_grad_enabled() -> bool {
    current_mode().enabled
}

/// Restores the mode that was active when the guard was created.
#[must_use = "the previous mode is restored as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ModeGuard {
    previous: GradMode,
}

impl ModeGuard {
    /// Install `mode` until the returned guard is dropped.
    pub fn new(mode: GradMode) -> Self {
        let previous = MODE.with(|cell| cell.replace(mode));
        tracing::trace!(?mode, ?previous, "grad mode override");
        Self { previous }
    }
}

impl Drop for ModeGuard {
    fn drop(&mut self) {
        MODE.with(|cell| cell.set(self.previous));
    }
}

/// Run `f` with `mode` in effect, restoring the prior mode afterwards.
///
/// # Example
///
/// ```
/// use ndgrad::autograd::{GradMode, current_mode, with_mode};
///
/// let inside = with_mode(GradMode::disabled(), current_mode);
/// assert!(!inside.enabled);
/// assert!(current_mode().enabled);
/// ```
pub fn with_mode<R>(mode: GradMode, f: impl FnOnce() -> R) -> R {
    let _guard = ModeGuard::new(mode);
    f()
}

/// Run `f` with tracking disabled.
pub fn no_grad<R>(f: impl FnOnce() -> R) -> R {
    with_mode(GradMode::disabled(), f)
}

/// Run `f` with the default reverse-mode tracking enabled.
pub fn enable_grad<R>(f: impl FnOnce() -> R) -> R {
    with_mode(GradMode::reverse_only(), f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{AssertUnwindSafe, catch_unwind};

    #[test]
    fn test_default_mode() {
        assert_eq!(current_mode(), GradMode::default());
        assert!(current_mode().records_nodes());
        assert!(!current_mode().propagates_tangents());
    }

    #[test]
    fn test_nested_overrides_restore() {
        with_mode(GradMode::forward_only(), || {
            assert_eq!(current_mode(), GradMode::forward_only());
            no_grad(|| {
                assert!(!is_grad_enabled());
                enable_grad(|| assert!(current_mode().records_nodes()));
                assert!(!is_grad_enabled());
            });
            assert_eq!(current_mode(), GradMode::forward_only());
        });
        assert_eq!(current_mode(), GradMode::default());
    }

    #[test]
    fn test_restored_after_error_return() {
        let result: Result<(), &str> = with_mode(GradMode::disabled(), || {
            Err::<(), _>("failed")?;
            Ok(())
        });
        assert!(result.is_err());
        assert!(is_grad_enabled());
    }

    #[test]
    fn test_restored_after_panic() {
        let result = catch_unwind(AssertUnwindSafe(|| {
            no_grad::<()>(|| panic!("boom"));
        }));
        assert!(result.is_err());
        assert!(is_grad_enabled());
    }

    #[test]
    fn test_disabled_overrides_flags() {
        let mode = GradMode {
            enabled: false,
            reverse: true,
            forward: true,
        };
        assert!(!mode.records_nodes());
        assert!(!mode.propagates_tangents());
    }

    #[test]
    fn test_modes_are_per_thread() {
        no_grad(|| {
            let other = std::thread::spawn(is_grad_enabled).join().unwrap();
            assert!(other);
            assert!(!is_grad_enabled());
        });
    }
}
