//! State machines behind the live display, the guest upload flow and the
//! role-gated navigation. Nothing here performs I/O; timers take an injected
//! `Instant` so the server loop owns the clock.

pub mod media_feed;
pub mod routes;
pub mod slideshow;
pub mod slug;
pub mod wizard;
