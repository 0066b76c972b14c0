//! Live display socket: one connection loop per screen, driving a
//! slideshow from timers, the platform change feed and a polling fallback.

pub mod live;

pub use live::{LiveConfig, handle_live_connection, resolve_live_event};
