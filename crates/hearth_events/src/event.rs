//! # Event Contract
//!
//! Events are plain values drawn from a pool, published, and returned to the
//! pool once every handler has run.

use std::any::type_name;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Dispatch priority. Higher runs first.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum EventPriority {
    /// Cosmetic or deferrable work.
    Low = 0,
    /// Regular gameplay traffic.
    #[default]
    Normal = 1,
    /// Must run before regular traffic.
    High = 2,
    /// Must run before everything else.
    Critical = 3,
}

/// Error a handler reports to the bus.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// What every handler returns.
pub type HandlerResult = Result<(), HandlerError>;

/// Marker trait for events.
///
/// `Default` is required so a pool can construct a fresh instance when it
/// has nothing to reuse.
///
/// # Example
///
/// ```rust
/// use hearth_events::{Event, EventPriority};
///
/// #[derive(Clone, Debug, Default)]
/// struct PlayerDied {
///     player: u64,
/// }
///
/// impl Event for PlayerDied {
///     fn priority(&self) -> EventPriority {
///         EventPriority::High
///     }
/// }
/// ```
pub trait Event: Default + Send + Sync + 'static {
    /// Priority used by the prioritized queue and pool.
    fn priority(&self) -> EventPriority {
        EventPriority::Normal
    }

    /// Human-readable name used in logs and statistics.
    #[must_use]
    fn event_name() -> &'static str {
        type_name::<Self>()
    }
}

/// Process-unique event identifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct EventId(u64);

static NEXT_EVENT_ID: AtomicU64 = AtomicU64::new(1);

impl EventId {
    /// Hands out the next identifier. Never returns 0.
    #[must_use]
    pub fn generate() -> Self {
        Self(NEXT_EVENT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "evt-{}", self.0)
    }
}
