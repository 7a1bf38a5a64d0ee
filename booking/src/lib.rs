//! # Tablewise Booking
//!
//! The embeddable restaurant-booking core: an add-on selection constraint
//! engine and the hold → details → (pay) → confirm session state machine,
//! built on the Tablewise reducer architecture.
//!
//! ## Architecture
//!
//! Booking logic is implemented as reducers and effects:
//!
//! ```text
//! Action → Reducer → (State, Effects) → Effect Execution → More Actions
//! ```
//!
//! The pure parts (selection validation, pricing, completion) live in
//! [`selection`] and [`pricing`] and never touch the network; everything
//! effectful flows through the provider traits in [`providers`] so tests
//! run against mocks at memory speed.
//!
//! ## Example: validating a selection
//!
//! ```rust
//! use tablewise_booking::catalog::{SelectionContext, UsagePolicy};
//! use tablewise_booking::selection::{apply, completion, SelectionMutation, SelectionState};
//!
//! let ctx = SelectionContext {
//!     usage: UsagePolicy::OptionalMulti,
//!     max_menu_types: Some(2),
//!     addons: Vec::new(),
//! };
//! let state = SelectionState::empty();
//! assert!(completion(&ctx, 4, &state).is_complete());
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

// Public modules
pub mod actions;
pub mod availability;
pub mod catalog;
pub mod config;
pub mod customer;
pub mod environment;
pub mod error;
pub mod money;
pub mod pricing;
pub mod providers;
pub mod reducers;
pub mod selection;
pub mod state;
pub mod wire;

#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

// Re-export main types for convenience
pub use actions::BookingAction;
pub use config::BookingConfig;
pub use environment::BookingEnvironment;
pub use error::BookingError;
pub use money::Money;
pub use reducers::BookingReducer;
pub use state::{BookingState, SessionPhase};
