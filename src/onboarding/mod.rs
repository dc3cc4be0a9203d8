//! Onboarding — first-run provisioning for a new user.
//!
//! A new user gets a private workspace, a copy of the global welcome
//! template as their first board, and tour markers in their user properties
//! so the client starts the guided tour.

pub mod cloner;
pub mod manager;
pub mod state;

pub use cloner::{CloneRequest, ClonedTree, TemplateCloner, regenerate_ids};
pub use manager::{OnboardingManager, PreparedTour, find_welcome_board};
pub use state::{TourCategory, TourState, TourStep, initial_tour_patch};
