//! # wsfan-core
//!
//! Shared vocabulary for the wsfan crates:
//!
//! - **Constants**: WebSocket close codes and subscription timing defaults
//! - **Events**: what the broadcast tap republishes and what subscribers observe
//! - **Logging**: `tracing` subscriber setup and in-memory capture for tests

#![deny(unsafe_code)]

pub mod constants;
pub mod events;
pub mod logging;

pub use events::{InboundEvent, SubscriptionEvent};
