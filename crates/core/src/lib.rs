//! Nudge Core - Shared types and behavior scoring.
//!
//! This crate provides the pieces every Nudge component agrees on:
//! - `storefront` - Public storefront and back-office HTTP service
//! - `cli` - Command-line tools for migrations and management
//!
//! # Architecture
//!
//! The core crate contains only types and pure computation - no I/O, no
//! database access, no HTTP clients. Training the intent network is plain
//! arithmetic over slices, so it lives here and can be tested without a runtime.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, money, emails, statuses and roles
//! - [`behavior`] - Behavior samples, aggregation, the dense network, the
//!   training schedule and the message tables driven by the conversion score

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod behavior;
pub mod types;

pub use types::*;
