//! Default values shared by the client and its configuration.
//!
//! # Usage
//!
//! ```
//! use sockline_core::constants::*;
//! use std::time::Duration;
//!
//! let grace = Duration::from_millis(DEFAULT_SHUTDOWN_TIMEOUT_MS);
//! assert_eq!(grace.as_millis(), 500);
//! ```

// ============================================================================
// Event Dispatch
// ============================================================================

/// Default bound of the event queue between producers and observers.
///
/// Once this many events are waiting for observers, producers (including the
/// receive loop) wait for space instead of buffering further.
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 1024;

/// Smallest accepted event queue bound.
pub const MIN_EVENT_QUEUE_CAPACITY: usize = 1;

// ============================================================================
// Teardown
// ============================================================================

/// Default limit, in milliseconds, for each flush/shutdown step of a
/// graceful disconnect.
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 500;

// ============================================================================
// Socket Options
// ============================================================================

/// TCP_NODELAY is enabled unless configured otherwise.
pub const DEFAULT_NODELAY: bool = true;

/// SO_KEEPALIVE is left off unless configured otherwise.
pub const DEFAULT_KEEPALIVE: bool = false;

// ============================================================================
// Framing
// ============================================================================

/// Initial capacity of the read buffer behind the framed duplex stream.
pub const READ_BUFFER_CAPACITY: usize = 8 * 1024;
