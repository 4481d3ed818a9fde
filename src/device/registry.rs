//! Exclusive device ownership — [`DeviceRegistry`] and [`DeviceHandle`].
//!
//! A [`DeviceHandle`] represents one exclusively-owned hardware stream
//! (camera or microphone). The registry hands out at most one live handle
//! per [`DeviceKind`] and counts every acquire/release so tests can check
//! the invariant directly.
//!
//! Handles release on drop, so every exit path — success, error, or a
//! future being dropped mid-await — returns the device to the registry.

use std::sync::{Arc, Mutex};

use thiserror::Error;

// ---------------------------------------------------------------------------
// DeviceKind
// ---------------------------------------------------------------------------

/// The two physical device kinds the pipeline captures from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Camera,
    Microphone,
}

impl DeviceKind {
    fn index(self) -> usize {
        match self {
            DeviceKind::Camera => 0,
            DeviceKind::Microphone => 1,
        }
    }
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceKind::Camera => write!(f, "camera"),
            DeviceKind::Microphone => write!(f, "microphone"),
        }
    }
}

// ---------------------------------------------------------------------------
// DeviceError
// ---------------------------------------------------------------------------

/// Errors from device acquisition or the underlying hardware stream.
#[derive(Debug, Clone, Error)]
pub enum DeviceError {
    /// A handle of this kind is already open in this session.
    #[error("{0} is already in use")]
    Busy(DeviceKind),

    /// The device is missing, or the platform denied access to it.
    #[error("{0} unavailable: {1}")]
    Unavailable(DeviceKind, String),

    /// The stream failed after the device was acquired.
    #[error("{0} stream error: {1}")]
    Stream(DeviceKind, String),
}

// ---------------------------------------------------------------------------
// DeviceRegistry
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Counters {
    open: [bool; 2],
    acquired: [u64; 2],
    released: [u64; 2],
}

/// Tracks which device kinds are currently held and hands out handles.
///
/// Cheap to clone (`Arc` clone); one registry per capture session.
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    inner: Arc<Mutex<Counters>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire exclusive ownership of `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::Busy`] when a handle of the same kind is still
    /// open — the previous handle must be released (dropped) first.
    pub fn acquire(&self, kind: DeviceKind) -> Result<DeviceHandle, DeviceError> {
        let mut counters = self.inner.lock().unwrap();
        if counters.open[kind.index()] {
            return Err(DeviceError::Busy(kind));
        }
        counters.open[kind.index()] = true;
        counters.acquired[kind.index()] += 1;

        log::debug!("device: acquired {kind}");
        Ok(DeviceHandle {
            kind,
            inner: Arc::clone(&self.inner),
            released: false,
        })
    }

    /// Number of currently open handles of `kind` (0 or 1).
    pub fn open_count(&self, kind: DeviceKind) -> usize {
        usize::from(self.inner.lock().unwrap().open[kind.index()])
    }

    /// Total number of successful acquisitions of `kind` so far.
    pub fn acquired_total(&self, kind: DeviceKind) -> u64 {
        self.inner.lock().unwrap().acquired[kind.index()]
    }

    /// Total number of releases of `kind` so far.
    pub fn released_total(&self, kind: DeviceKind) -> u64 {
        self.inner.lock().unwrap().released[kind.index()]
    }
}

// ---------------------------------------------------------------------------
// DeviceHandle
// ---------------------------------------------------------------------------

/// Exclusively-owned lease on one device kind.
///
/// Releases on drop; [`release`](Self::release) makes the hand-back explicit
/// where that reads better than a scope end.
#[derive(Debug)]
pub struct DeviceHandle {
    kind: DeviceKind,
    inner: Arc<Mutex<Counters>>,
    released: bool,
}

impl DeviceHandle {
    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    /// Release the device back to the registry.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let mut counters = self.inner.lock().unwrap();
        counters.open[self.kind.index()] = false;
        counters.released[self.kind.index()] += 1;
        log::debug!("device: released {}", self.kind);
    }
}

impl Drop for DeviceHandle {
    fn drop(&mut self) {
        self.release_inner();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_then_drop_releases() {
        let registry = DeviceRegistry::new();

        let handle = registry.acquire(DeviceKind::Camera).unwrap();
        assert_eq!(registry.open_count(DeviceKind::Camera), 1);
        drop(handle);

        assert_eq!(registry.open_count(DeviceKind::Camera), 0);
        assert_eq!(registry.acquired_total(DeviceKind::Camera), 1);
        assert_eq!(registry.released_total(DeviceKind::Camera), 1);
    }

    #[test]
    fn second_acquire_of_same_kind_is_rejected() {
        let registry = DeviceRegistry::new();

        let _handle = registry.acquire(DeviceKind::Microphone).unwrap();
        let err = registry.acquire(DeviceKind::Microphone).unwrap_err();
        assert!(matches!(err, DeviceError::Busy(DeviceKind::Microphone)));
    }

    #[test]
    fn different_kinds_do_not_conflict() {
        let registry = DeviceRegistry::new();

        let _camera = registry.acquire(DeviceKind::Camera).unwrap();
        let _microphone = registry.acquire(DeviceKind::Microphone).unwrap();
        assert_eq!(registry.open_count(DeviceKind::Camera), 1);
        assert_eq!(registry.open_count(DeviceKind::Microphone), 1);
    }

    #[test]
    fn release_permits_reacquisition() {
        let registry = DeviceRegistry::new();

        registry.acquire(DeviceKind::Camera).unwrap().release();
        let _handle = registry.acquire(DeviceKind::Camera).unwrap();
        assert_eq!(registry.acquired_total(DeviceKind::Camera), 2);
    }

    #[test]
    fn explicit_release_is_not_double_counted_on_drop() {
        let registry = DeviceRegistry::new();

        let handle = registry.acquire(DeviceKind::Camera).unwrap();
        handle.release(); // drop runs afterwards too

        assert_eq!(registry.released_total(DeviceKind::Camera), 1);
    }

    #[test]
    fn handle_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<DeviceHandle>();
    }
}
