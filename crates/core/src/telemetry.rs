//! Lightweight in-process event log so view-model behaviour can be inspected while prototyping.

use parking_lot::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    SessionStarted { user_id: String, role: String },
    SessionEnded,
    RefreshRequested(&'static str),
    RefreshCompleted { collection: &'static str, count: usize },
    RefreshFailed { collection: &'static str, error: String },
    RefreshDiscarded(&'static str),
    MutationApplied { collection: &'static str, action: &'static str },
    MutationFailed {
        collection: &'static str,
        action: &'static str,
        error: String,
    },
}

#[derive(Debug)]
pub struct Handle {
    #[cfg(feature = "telemetry")]
    events: Mutex<Vec<Event>>,
}

impl Default for Handle {
    fn default() -> Self {
        Self::new()
    }
}

impl Handle {
    pub fn new() -> Self {
        Self {
            #[cfg(feature = "telemetry")]
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn record(&self, event: Event) {
        #[cfg(feature = "telemetry")]
        {
            match &event {
                Event::SessionStarted { user_id, role } => tracing::debug!(
                    user_id = user_id.as_str(),
                    role = role.as_str(),
                    "telemetry session started"
                ),
                Event::SessionEnded => tracing::debug!("telemetry session ended"),
                Event::RefreshRequested(collection) => {
                    tracing::debug!(collection, "telemetry refresh requested")
                }
                Event::RefreshCompleted { collection, count } => {
                    tracing::debug!(collection, count, "telemetry refresh completed")
                }
                Event::RefreshFailed { collection, error } => {
                    tracing::debug!(collection, error = %error, "telemetry refresh failed")
                }
                Event::RefreshDiscarded(collection) => {
                    tracing::debug!(collection, "telemetry stale refresh discarded")
                }
                Event::MutationApplied { collection, action } => {
                    tracing::debug!(collection, action, "telemetry mutation applied")
                }
                Event::MutationFailed {
                    collection,
                    action,
                    error,
                } => tracing::debug!(
                    collection,
                    action,
                    error = %error,
                    "telemetry mutation failed"
                ),
            }
            self.events.lock().push(event);
        }
        #[cfg(not(feature = "telemetry"))]
        {
            let _ = event;
        }
    }

    pub fn is_enabled(&self) -> bool {
        cfg!(feature = "telemetry")
    }

    /// Copy of the recorded events, oldest first. Empty when telemetry is compiled out.
    pub fn events(&self) -> Vec<Event> {
        #[cfg(feature = "telemetry")]
        {
            self.events.lock().clone()
        }
        #[cfg(not(feature = "telemetry"))]
        {
            Vec::new()
        }
    }
}
