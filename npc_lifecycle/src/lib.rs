//! # Lifecycle
//!
//! Cooperative cancellation and timeout primitives for npc invocations.
//!
//! ## Philosophy
//!
//! - **Explicit over implicit**: Cancellation is a value passed into a call, never ambient
//! - **Cooperative**: Cancelling only asks; the callee stops at its next suspension point
//! - **Mechanism not policy**: The core never times out on its own; callers arm timers
//!
//! ## Core Concepts
//!
//! - `CancellationToken`: Cloneable handle to check or await cancellation
//! - `CancellationSource`: Controller that can trigger cancellation
//! - `CancellationReason`: Why cancellation occurred
//! - `Timeout`: Duration after which a source is cancelled

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Reason for cancellation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancellationReason {
    /// Caller-initiated cancellation
    UserCancel,
    /// A caller-armed timer fired
    Timeout,
    /// The calling side went away (transport closed, client dropped)
    CallerGone,
    /// Custom reason with description
    Custom(String),
}

impl fmt::Display for CancellationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancellationReason::UserCancel => write!(f, "user cancelled"),
            CancellationReason::Timeout => write!(f, "timeout"),
            CancellationReason::CallerGone => write!(f, "caller gone"),
            CancellationReason::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

/// Internal state of a cancellation token
#[derive(Debug, Clone, PartialEq, Eq)]
enum CancellationState {
    Active,
    Cancelled(CancellationReason),
}

/// Shared state between CancellationToken and CancellationSource
#[derive(Debug)]
struct SharedCancellationState {
    state: Mutex<CancellationState>,
    notify: Notify,
}

impl SharedCancellationState {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(CancellationState::Active),
            notify: Notify::new(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, CancellationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_cancelled(&self) -> bool {
        matches!(*self.lock(), CancellationState::Cancelled(_))
    }

    fn reason(&self) -> Option<CancellationReason> {
        match &*self.lock() {
            CancellationState::Active => None,
            CancellationState::Cancelled(reason) => Some(reason.clone()),
        }
    }

    /// First cancellation wins; later calls keep the original reason.
    fn cancel(&self, reason: CancellationReason) -> bool {
        {
            let mut state = self.lock();
            if matches!(*state, CancellationState::Cancelled(_)) {
                return false;
            }
            *state = CancellationState::Cancelled(reason);
        }
        self.notify.notify_waiters();
        true
    }
}

/// A cloneable token that can be checked or awaited for cancellation
///
/// This is the "signal" passed alongside a call. It is cheap to clone and
/// check.
///
/// ## Example
///
/// ```
/// use npc_lifecycle::{CancellationSource, CancellationReason};
///
/// let source = CancellationSource::new();
/// let token = source.token();
///
/// assert!(!token.is_cancelled());
///
/// source.cancel(CancellationReason::UserCancel);
/// assert!(token.is_cancelled());
/// assert_eq!(token.reason(), Some(CancellationReason::UserCancel));
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    shared: Arc<SharedCancellationState>,
}

impl CancellationToken {
    /// Creates a new token that is never cancelled
    ///
    /// Useful for operations that don't support cancellation.
    pub fn none() -> Self {
        Self {
            shared: SharedCancellationState::new(),
        }
    }

    /// Checks if cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.shared.is_cancelled()
    }

    /// Returns the reason for cancellation, if cancelled
    pub fn reason(&self) -> Option<CancellationReason> {
        self.shared.reason()
    }

    /// Throws an error if cancelled
    pub fn throw_if_cancelled(&self) -> Result<(), LifecycleError> {
        if let Some(reason) = self.reason() {
            Err(LifecycleError::Cancelled { reason })
        } else {
            Ok(())
        }
    }

    /// Resolves once cancellation is requested
    ///
    /// Resolves immediately if the token is already cancelled. A token from
    /// [`CancellationToken::none`] never resolves.
    pub async fn cancelled(&self) -> CancellationReason {
        loop {
            // Register interest before checking, so a cancel between the
            // check and the await is not missed.
            let notified = self.shared.notify.notified();
            if let Some(reason) = self.reason() {
                return reason;
            }
            notified.await;
        }
    }
}

/// A controller that can trigger cancellation
///
/// CancellationSource creates tokens and can cancel them all at once.
///
/// ## Example
///
/// ```
/// use npc_lifecycle::{CancellationSource, CancellationReason};
///
/// let source = CancellationSource::new();
/// let token1 = source.token();
/// let token2 = source.token();
///
/// // Both tokens see the same cancellation
/// source.cancel(CancellationReason::Timeout);
/// assert!(token1.is_cancelled());
/// assert!(token2.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationSource {
    shared: Arc<SharedCancellationState>,
}

impl CancellationSource {
    /// Creates a new cancellation source
    pub fn new() -> Self {
        Self {
            shared: SharedCancellationState::new(),
        }
    }

    /// Creates a token from this source
    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Cancels all tokens from this source
    ///
    /// Returns `false` if the source was already cancelled, in which case the
    /// original reason is kept.
    pub fn cancel(&self, reason: CancellationReason) -> bool {
        self.shared.cancel(reason)
    }

    /// Checks if this source has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.shared.is_cancelled()
    }
}

impl Default for CancellationSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Timeout specifies a duration-based timeout
///
/// A timeout does nothing until it is armed against a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeout {
    duration: Duration,
}

impl Timeout {
    /// Creates a timeout with the specified duration
    pub fn after(duration: Duration) -> Self {
        Self { duration }
    }

    /// Creates a timeout from milliseconds
    pub fn from_millis(millis: u64) -> Self {
        Self {
            duration: Duration::from_millis(millis),
        }
    }

    /// Creates a timeout from seconds
    pub fn from_secs(secs: u64) -> Self {
        Self {
            duration: Duration::from_secs(secs),
        }
    }

    /// Returns the duration of this timeout
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Cancels `source` with [`CancellationReason::Timeout`] once the duration elapses
    ///
    /// Must be called from within a Tokio runtime. Aborting the returned
    /// handle disarms the timer.
    pub fn arm(&self, source: &CancellationSource) -> JoinHandle<()> {
        let source = source.clone();
        let duration = self.duration;
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            source.cancel(CancellationReason::Timeout);
        })
    }
}

/// Errors related to lifecycle operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    Cancelled { reason: CancellationReason },
}

impl fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleError::Cancelled { reason } => {
                write!(f, "Operation was cancelled: {}", reason)
            }
        }
    }
}

impl std::error::Error for LifecycleError {}
