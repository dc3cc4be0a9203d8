//! Boards onboarding — first-run provisioning of a user's workspace and
//! welcome board.

pub mod config;
pub mod error;
pub mod model;
pub mod onboarding;
pub mod store;
