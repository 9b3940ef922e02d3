//! Presentation-facing services.
//!
//! # Responsibility
//! - Keep presentation code away from the store: it sees live views, a
//!   query field, fire-and-forget writes and a few awaited calls.
//! - Run every store call off the caller's thread.

mod commands;
pub mod view_state;

pub use view_state::{CoordinatorError, CoordinatorResult, ViewStateCoordinator};
