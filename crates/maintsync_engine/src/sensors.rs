//! Environment sensors consulted by the sync engine.
//!
//! The engine checks a [`ConnectivitySensor`] before every drain cycle and
//! listens to a [`LifecycleSensor`] to drain as soon as the application
//! returns to the foreground.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Reports network reachability.
#[async_trait]
pub trait ConnectivitySensor: Send + Sync {
    /// Returns true if the remote store is believed to be reachable.
    async fn is_connected(&self) -> bool;
}

#[async_trait]
impl<T: ConnectivitySensor + ?Sized> ConnectivitySensor for Arc<T> {
    async fn is_connected(&self) -> bool {
        (**self).is_connected().await
    }
}

/// A sensor that always reports connectivity.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOnline;

#[async_trait]
impl ConnectivitySensor for AlwaysOnline {
    async fn is_connected(&self) -> bool {
        true
    }
}

/// A connectivity sensor driven by the host platform (or a test).
#[derive(Debug)]
pub struct ManualConnectivity {
    connected: AtomicBool,
}

impl ManualConnectivity {
    /// Creates a sensor with the given initial state.
    pub fn new(connected: bool) -> Self {
        Self {
            connected: AtomicBool::new(connected),
        }
    }

    /// Updates the reported state.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }
}

impl Default for ManualConnectivity {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl ConnectivitySensor for ManualConnectivity {
    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Application visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    /// The app is visible and active.
    Foreground,
    /// The app is hidden or suspended.
    Background,
}

/// Callback invoked on a background to foreground transition.
pub type ForegroundCallback = Box<dyn Fn() + Send + Sync>;

/// Reports application lifecycle transitions.
pub trait LifecycleSensor: Send + Sync {
    /// Registers `callback` to run every time the app returns to the foreground.
    fn on_foreground(&self, callback: ForegroundCallback);
}

impl<T: LifecycleSensor + ?Sized> LifecycleSensor for Arc<T> {
    fn on_foreground(&self, callback: ForegroundCallback) {
        (**self).on_foreground(callback)
    }
}

/// A lifecycle sensor fed by the host platform's state-change events.
///
/// Callbacks run synchronously inside [`ManualLifecycle::set_state`] and
/// must not register further callbacks.
pub struct ManualLifecycle {
    state: Mutex<AppState>,
    callbacks: Mutex<Vec<ForegroundCallback>>,
}

impl ManualLifecycle {
    /// Creates a sensor starting in the foreground.
    pub fn new() -> Self {
        Self::with_state(AppState::Foreground)
    }

    /// Creates a sensor starting in `state`.
    pub fn with_state(state: AppState) -> Self {
        Self {
            state: Mutex::new(state),
            callbacks: Mutex::new(Vec::new()),
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> AppState {
        *self.state.lock()
    }

    /// Records a state change, returning true if foreground callbacks ran.
    pub fn set_state(&self, next: AppState) -> bool {
        let previous = std::mem::replace(&mut *self.state.lock(), next);
        if previous == AppState::Background && next == AppState::Foreground {
            for callback in self.callbacks.lock().iter() {
                callback();
            }
            true
        } else {
            false
        }
    }
}

impl Default for ManualLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ManualLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualLifecycle")
            .field("state", &self.state())
            .field("callbacks", &self.callbacks.lock().len())
            .finish()
    }
}

impl LifecycleSensor for ManualLifecycle {
    fn on_foreground(&self, callback: ForegroundCallback) {
        self.callbacks.lock().push(callback);
    }
}
