//! Pose sync between robot telemetry, the on-map marker and localization commits.

use amr_frame::{Point, Pose2D, angle_delta_degrees, normalize_degrees};
use amr_map::{CommitAck, CommitError, InitializeRequest};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::marker::RobotMarker;

const GESTURE_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncThresholds {
    pub position_m: f64,
    pub angle_deg: f64,
}

impl Default for SyncThresholds {
    fn default() -> Self {
        SyncThresholds {
            position_m: 0.001,
            angle_deg: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Success,
    Error,
}

/// A user-visible line of feedback.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusMessage {
    pub level: StatusLevel,
    pub text: String,
}

impl StatusMessage {
    pub fn info(text: impl Into<String>) -> Self {
        Self { level: StatusLevel::Info, text: text.into() }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self { level: StatusLevel::Success, text: text.into() }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self { level: StatusLevel::Error, text: text.into() }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncError {
    #[error("No robot marker on the map yet")]
    NoMarker,

    #[error("A localization request is already in progress")]
    CommitInFlight,
}

/// Owns the marker's state on behalf of the display surface.
#[derive(Debug, Default)]
pub struct PoseSync {
    thresholds: SyncThresholds,
    marker: Option<RobotMarker>,
    editing: bool,
    commit_in_flight: bool,
    status: Option<StatusMessage>,
}

impl PoseSync {
    pub fn new(thresholds: SyncThresholds) -> Self {
        Self {
            thresholds,
            ..Default::default()
        }
    }

    /// Install a freshly created marker, dropping any previous one.
    pub fn attach(&mut self, marker: RobotMarker) {
        self.marker = Some(marker);
        self.editing = false;
    }

    pub fn detach(&mut self) {
        self.marker = None;
        self.editing = false;
    }

    pub fn marker(&self) -> Option<&RobotMarker> {
        self.marker.as_ref()
    }

    /// Mutable access for direct manipulation. Entering it marks the pose as edited.
    fn edit_marker(&mut self) -> Option<&mut RobotMarker> {
        let marker = self.marker.as_mut()?;
        self.editing = true;
        Some(marker)
    }

    /// Drag the marker to a display-local position. Only an actual move starts an edit.
    pub fn drag_to(&mut self, local: Point) -> bool {
        let Some(marker) = self.marker.as_ref() else {
            return false;
        };
        if marker.local_pose().position().distance_to(local) <= GESTURE_EPSILON {
            return false;
        }
        if let Some(marker) = self.edit_marker() {
            marker.set_local_position(local);
        }
        true
    }

    /// Turn the marker to a raw clockwise handle angle. Only an actual turn starts an edit.
    pub fn rotate_to(&mut self, raw_degrees: f64) -> bool {
        let Some(marker) = self.marker.as_ref() else {
            return false;
        };
        if angle_delta_degrees(marker.rotation(), normalize_degrees(raw_degrees)) <= GESTURE_EPSILON {
            return false;
        }
        if let Some(marker) = self.edit_marker() {
            marker.set_rotation(raw_degrees);
        }
        true
    }

    /// Turn the metric heading by `delta_degrees` (counter-clockwise positive).
    pub fn nudge_heading(&mut self, delta_degrees: f64) -> bool {
        let Some(heading) = self.marker.as_ref().map(|m| m.get_pose().angle_degrees()) else {
            return false;
        };
        if delta_degrees == 0.0 {
            return false;
        }
        if let Some(marker) = self.edit_marker() {
            marker.rotate(heading + delta_degrees);
        }
        true
    }

    pub fn is_editing(&self) -> bool {
        self.editing
    }

    pub fn commit_in_flight(&self) -> bool {
        self.commit_in_flight
    }

    /// Drop the user's edit; the next telemetry push moves the marker again.
    pub fn discard_edit(&mut self) {
        if self.editing {
            debug!("Pose edit discarded");
        }
        self.editing = false;
    }

    pub fn status(&self) -> Option<&StatusMessage> {
        self.status.as_ref()
    }

    pub fn set_status(&mut self, status: StatusMessage) {
        self.status = Some(status);
    }

    pub fn clear_status(&mut self) {
        self.status = None;
    }

    /// Apply a telemetry pose. Returns whether the marker moved.
    ///
    /// Ignored while the user holds an edit. Changes of at most the position or
    /// angle threshold are dropped to avoid redundant redraws.
    pub fn push_pose(&mut self, metric: Pose2D) -> bool {
        if self.editing {
            return false;
        }
        let Some(marker) = self.marker.as_mut() else {
            return false;
        };
        let current = marker.get_pose();
        let moved = current.distance_to(&metric) > self.thresholds.position_m;
        let turned =
            angle_delta_degrees(current.angle_degrees(), metric.angle_degrees()) > self.thresholds.angle_deg;
        if !moved && !turned {
            return false;
        }
        marker.set_pose(metric);
        true
    }

    /// Build the initialize request from the marker's current pose.
    pub fn commit_request(&mut self) -> Result<InitializeRequest, SyncError> {
        if self.commit_in_flight {
            return Err(SyncError::CommitInFlight);
        }
        let marker = self.marker.as_ref().ok_or(SyncError::NoMarker)?;
        let pose = marker.get_pose();
        let request = InitializeRequest::from_pose(&pose);
        info!(%pose, theta = request.theta, "Committing localization pose");
        self.commit_in_flight = true;
        self.status = Some(StatusMessage::info("Initializing localization..."));
        Ok(request)
    }

    /// Record the outcome of a commit. The marker pose is never touched here.
    pub fn finish_commit(&mut self, result: Result<CommitAck, CommitError>) -> &StatusMessage {
        self.commit_in_flight = false;
        let status = match result {
            Ok(CommitAck::Confirmed) => {
                info!("Localization initialized");
                self.editing = false;
                StatusMessage::success("Localization initialized")
            }
            Ok(CommitAck::Unconfirmed) => {
                info!("Localization request accepted without a readable confirmation");
                self.editing = false;
                StatusMessage::info("Localization request accepted, but the robot's reply was unreadable")
            }
            Err(err) => {
                warn!(%err, "Localization initialization failed");
                StatusMessage::error(err.to_string())
            }
        };
        self.status.insert(status)
    }
}
