//! Online/offline tracking with edge-triggered notifications.
//!
//! The platform feeds raw signals in through [`ConnectivityMonitor::set_state`];
//! repeated identical signals are swallowed, so each registered handler runs
//! exactly once per transition into its direction.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;
use tokio::sync::watch;
use tracing::{info, warn};

/// Network reachability as seen by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    Online,
    Offline,
}

impl Connectivity {
    /// Maps a platform "is online" reading. An unavailable reading counts as
    /// online.
    pub fn from_signal(signal: Option<bool>) -> Self {
        match signal {
            Some(false) => Self::Offline,
            Some(true) | None => Self::Online,
        }
    }
}

impl fmt::Display for Connectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online => write!(f, "online"),
            Self::Offline => write!(f, "offline"),
        }
    }
}

type TransitionHandler = Box<dyn Fn(Connectivity) + Send + Sync>;

/// Tracks connectivity and notifies handlers on transitions.
pub struct ConnectivityMonitor {
    state: watch::Sender<Connectivity>,
    handlers: Mutex<Vec<(Connectivity, TransitionHandler)>>,
}

impl ConnectivityMonitor {
    /// Creates a monitor with a known initial state.
    pub fn new(initial: Connectivity) -> Self {
        let (state, _) = watch::channel(initial);
        Self {
            state,
            handlers: Mutex::new(Vec::new()),
        }
    }

    /// Creates a monitor from a platform reading that may be unavailable.
    pub fn from_signal(signal: Option<bool>) -> Self {
        if signal.is_none() {
            warn!("Connectivity signal unavailable, assuming online");
        }
        Self::new(Connectivity::from_signal(signal))
    }

    /// Returns the current state.
    pub fn current_state(&self) -> Connectivity {
        *self.state.borrow()
    }

    /// Returns true if currently online.
    pub fn is_online(&self) -> bool {
        self.current_state() == Connectivity::Online
    }

    /// Feeds a new reading. Returns true if it was a transition.
    ///
    /// Handlers run synchronously on the calling thread and must not register
    /// further handlers.
    pub fn set_state(&self, next: Connectivity) -> bool {
        let changed = self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        if changed {
            info!("Connectivity changed: {}", next);
            let handlers = self.handlers.lock().unwrap_or_else(|e| e.into_inner());
            for (direction, handler) in handlers.iter() {
                if *direction == next {
                    handler(next);
                }
            }
        }
        changed
    }

    /// Feeds a raw platform reading; see [`Connectivity::from_signal`].
    pub fn report_signal(&self, signal: Option<bool>) -> bool {
        self.set_state(Connectivity::from_signal(signal))
    }

    /// Registers `callback` to run on every transition into `direction`.
    pub fn on_transition<F>(&self, direction: Connectivity, callback: F)
    where
        F: Fn(Connectivity) + Send + Sync + 'static,
    {
        self.handlers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((direction, Box::new(callback)));
    }

    /// Subscribes to state changes.
    pub fn subscribe(&self) -> watch::Receiver<Connectivity> {
        self.state.subscribe()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::from_signal(None)
    }
}

impl fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("state", &self.current_state())
            .finish_non_exhaustive()
    }
}
