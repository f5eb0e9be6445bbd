//! Wire types exchanged with the robot's edge service.
//!
//! Every field the viewer depends on is optional on the wire; the map loader
//! decides which absences are fatal.

use amr_frame::{Pose25D, Pose2D};
use serde::{Deserialize, Serialize};

/// Body of `GET /node-api/edge/state`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AmrState {
    /// Localization block, absent while the robot has not started localizing.
    #[serde(default)]
    pub localization: Option<Localization>,
}

/// The robot's localization report.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Localization {
    /// Whether the robot considers itself localized.
    #[serde(default)]
    pub localized: bool,
    /// Localization confidence in `[0, 1]`.
    #[serde(default)]
    pub confidence: Option<f64>,
    /// Map the robot is localized in.
    #[serde(default)]
    pub map: Option<MapInfo>,
    /// Current robot pose in the map frame (theta in radians).
    #[serde(default)]
    pub pose: Option<Pose25D>,
}

impl Localization {
    /// Robot pose as a metric [`Pose2D`], if reported.
    pub fn robot_pose(&self) -> Option<Pose2D> {
        self.pose.map(Pose2D::from_pose25d)
    }
}

/// Map metadata embedded in the localization report.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MapInfo {
    /// Map identifier used to fetch the image.
    #[serde(default)]
    pub data: Option<String>,
    /// Meters per image pixel.
    #[serde(default)]
    pub resolution: Option<f64>,
    /// Metric pose of the image's bottom-left pixel.
    #[serde(default)]
    pub origin: Option<Pose25D>,
    /// Human readable map name.
    #[serde(default)]
    pub name: Option<String>,
}

/// Body of `PUT /node-api/edge/localization/initialize`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InitializeRequest {
    /// x position (m).
    pub x: f64,
    /// y position (m).
    pub y: f64,
    /// Heading (rad), REP-103.
    pub theta: f64,
}

impl InitializeRequest {
    /// Build the request from a metric pose. The heading goes out in radians.
    pub fn from_pose(pose: &Pose2D) -> Self {
        InitializeRequest {
            x: pose.x,
            y: pose.y,
            theta: pose.theta_radians(),
        }
    }
}

/// Body returned by the initialize endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InitializeResponse {
    /// Whether the robot accepted the pose.
    #[serde(default = "default_success")]
    pub success: bool,
    /// Optional explanation from the robot.
    #[serde(default)]
    pub message: Option<String>,
}

fn default_success() -> bool {
    true
}

/// How the robot acknowledged an accepted initialize request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitAck {
    /// The body confirmed success, or was empty.
    Confirmed,
    /// 2xx status, but the body could not be read as an [`InitializeResponse`].
    Unconfirmed,
}
