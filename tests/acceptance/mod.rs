//! Integration tests for the time-sync subsystem.
//!
//! - Broadcast cadence and sample ordering on the bus
//! - Rate-limiter pacing and overrun accounting
//! - Configuration loading and serial bring-up

mod broadcast_test;
mod common;
mod config_test;
mod pacing_test;
