//! Shared types used across retarget modules
//!
//! Geometry, page actions and navigation wait policies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::error::TargetingError;

/// Element geometry in CSS pixels at scan time
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    /// Create a new box
    pub fn new(top: f64, left: f64, width: f64, height: f64) -> Self {
        Self {
            top,
            left,
            width,
            height,
        }
    }

    /// Centre point as `(x, y)`
    pub fn center(&self) -> (f64, f64) {
        (self.left + self.width / 2.0, self.top + self.height / 2.0)
    }

    /// Whether the box has no clickable area
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Manhattan distance between the top-left corners of two boxes
    pub fn corner_distance(&self, other: &BoundingBox) -> f64 {
        (self.top - other.top).abs() + (self.left - other.left).abs()
    }

    /// Box with every component rounded to whole pixels
    pub fn rounded(&self) -> VisualPosition {
        VisualPosition {
            top: self.top.round() as i64,
            left: self.left.round() as i64,
            width: self.width.round() as i64,
            height: self.height.round() as i64,
        }
    }
}

/// Rounded on-screen position, stable enough to compare between scans
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VisualPosition {
    pub top: i64,
    pub left: i64,
    pub width: i64,
    pub height: i64,
}

/// Action performed against a located element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Click,
    #[serde(alias = "fill")]
    Type,
    Select,
    Hover,
    Clear,
    Check,
    Uncheck,
    Wait,
    Verify,
}

impl Action {
    /// Whether the action touches a live element at all
    pub fn needs_element(&self) -> bool {
        !matches!(self, Action::Wait)
    }

    /// Whether the action can fall back to a raw mouse click at coordinates
    pub fn supports_coordinates(&self) -> bool {
        matches!(self, Action::Click)
    }

    /// Wire name of the action
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Click => "click",
            Action::Type => "type",
            Action::Select => "select",
            Action::Hover => "hover",
            Action::Clear => "clear",
            Action::Check => "check",
            Action::Uncheck => "uncheck",
            Action::Wait => "wait",
            Action::Verify => "verify",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Action {
    type Err = TargetingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "click" => Ok(Action::Click),
            "type" | "fill" => Ok(Action::Type),
            "select" => Ok(Action::Select),
            "hover" => Ok(Action::Hover),
            "clear" => Ok(Action::Clear),
            "check" => Ok(Action::Check),
            "uncheck" => Ok(Action::Uncheck),
            "wait" => Ok(Action::Wait),
            "verify" => Ok(Action::Verify),
            other => Err(TargetingError::Other(format!("Unknown action: {}", other))),
        }
    }
}

/// When a navigation counts as finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitPolicy {
    Load,
    #[serde(rename = "domcontentloaded")]
    DomContentLoaded,
    #[default]
    NetworkIdle,
}

impl WaitPolicy {
    /// Load state name understood by the browser backend
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitPolicy::Load => "load",
            WaitPolicy::DomContentLoaded => "domcontentloaded",
            WaitPolicy::NetworkIdle => "networkidle",
        }
    }
}
