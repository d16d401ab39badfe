//! Per-segment read-pin lock.

use parking_lot::{Condvar, Mutex};

use crate::error::{FrameaError, Result};

/// Read-pin lock embedded by segment implementations.
///
/// Queries take shared pins; release paths take the exclusive side, which
/// refuses new pins and waits for in-flight pins to drain before running.
/// A destroyed lock refuses pins permanently, so a handle that went through
/// a full release can never be pinned again.
#[derive(Debug, Default)]
pub struct PinLock {
    state: Mutex<PinState>,
    changed: Condvar,
}

#[derive(Debug, Default)]
struct PinState {
    pins: u32,
    blocked: bool,
    destroyed: bool,
}

impl PinLock {
    pub fn new() -> Self {
        PinLock::default()
    }

    /// Take a shared pin on behalf of the segment with the given id.
    pub fn pin(&self, segment_id: i64) -> Result<()> {
        let mut state = self.state.lock();
        if state.blocked || state.destroyed {
            return Err(FrameaError::pin_refused(segment_id));
        }
        state.pins += 1;
        Ok(())
    }

    /// Drop a shared pin.
    pub fn unpin(&self) {
        let mut state = self.state.lock();
        debug_assert!(state.pins > 0, "unpin without a matching pin");
        state.pins = state.pins.saturating_sub(1);
        if state.pins == 0 {
            self.changed.notify_all();
        }
    }

    /// Run `f` exclusively: refuse new pins, wait for in-flight pins to
    /// drain, then execute `f` with the lock held against pinners.
    ///
    /// With `destroy`, the lock stays closed afterwards and later calls
    /// return `None` without running their closure; otherwise pinning
    /// re-opens once `f` returns.
    pub fn exclusive<R>(&self, destroy: bool, f: impl FnOnce() -> R) -> Option<R> {
        let mut state = self.state.lock();
        loop {
            if state.destroyed {
                return None;
            }
            if !state.blocked {
                break;
            }
            self.changed.wait(&mut state);
        }
        state.blocked = true;
        while state.pins > 0 {
            self.changed.wait(&mut state);
        }
        drop(state);

        let out = f();

        let mut state = self.state.lock();
        state.blocked = false;
        if destroy {
            state.destroyed = true;
        }
        self.changed.notify_all();
        Some(out)
    }

    /// Whether a full release has completed on this lock.
    pub fn is_destroyed(&self) -> bool {
        self.state.lock().destroyed
    }

    /// Number of currently outstanding pins.
    pub fn pin_count(&self) -> u32 {
        self.state.lock().pins
    }
}
