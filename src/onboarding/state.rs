//! Onboarding tour progress as stored in user properties.

use serde::{Deserialize, Serialize};

use crate::model::{UserPropPatch, UserProps};

/// User property keys read by the web client.
pub mod keys {
    pub const TOUR_STARTED: &str = "focalboard_onboardingTourStarted";
    pub const TOUR_STEP: &str = "focalboard_onboardingTourStep";
    pub const TOUR_CATEGORY: &str = "focalboard_tourCategory";
}

/// Group of tour steps the client is walking through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TourCategory {
    Onboarding,
    Card,
    Board,
}

impl TourCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Onboarding => "onboarding",
            Self::Card => "card",
            Self::Board => "board",
        }
    }
}

impl std::fmt::Display for TourCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TourCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "onboarding" => Ok(Self::Onboarding),
            "card" => Ok(Self::Card),
            "board" => Ok(Self::Board),
            other => Err(format!("unknown tour category: {other}")),
        }
    }
}

/// Position within a tour category. Stored as a decimal string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TourStep(pub u32);

impl TourStep {
    pub const FIRST: TourStep = TourStep(0);

    fn from_value(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => s.trim().parse().ok().map(Self),
            serde_json::Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()).map(Self),
            _ => None,
        }
    }
}

impl std::fmt::Display for TourStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tour progress of one user.
///
/// Onboarding only ever moves a user from `NoTour` to `Started` at the
/// first onboarding step; the client advances it from there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TourState {
    NoTour,
    Started { step: TourStep, category: TourCategory },
}

impl TourState {
    /// Read the tour state out of a user's properties.
    ///
    /// A started tour with a missing or unreadable marker falls back to the
    /// first onboarding step.
    pub fn from_props(props: &UserProps) -> Self {
        let started = props
            .get(keys::TOUR_STARTED)
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);
        if !started {
            return Self::NoTour;
        }

        let step = props
            .get(keys::TOUR_STEP)
            .and_then(TourStep::from_value)
            .unwrap_or(TourStep::FIRST);
        let category = props
            .get(keys::TOUR_CATEGORY)
            .and_then(serde_json::Value::as_str)
            .and_then(|s| s.parse().ok())
            .unwrap_or(TourCategory::Onboarding);

        Self::Started { step, category }
    }
}

/// Patch that starts the onboarding tour at its first step.
pub fn initial_tour_patch() -> UserPropPatch {
    UserPropPatch::default()
        .set(keys::TOUR_STARTED, true)
        .set(keys::TOUR_STEP, TourStep::FIRST.to_string())
        .set(keys::TOUR_CATEGORY, TourCategory::Onboarding.as_str())
}
