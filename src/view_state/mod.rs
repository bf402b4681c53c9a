//! View-state: what the dashboard renders.
//!
//! One task owns the `ViewState`; every write arrives as a `ViewAction`
//! over a channel and goes through `reduce`. Readers get snapshots from a
//! watch channel and failure notices from a broadcast channel. Nothing
//! outside this module mutates the state directly.

pub mod action;
pub mod reducer;
pub mod state;
pub mod store;

pub use action::{FailureNotice, RunOutcome, ViewAction};
pub use reducer::{reduce, Reduction, RejectReason};
pub use state::ViewState;
pub use store::{StoreClosed, ViewStoreHandle};
