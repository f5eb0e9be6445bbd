#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![doc = "A `no_std` library for robot map frames."]
#![doc = ""]
#![doc = "This crate converts between the metric map frame (ROS REP-103: x east, y north,"]
#![doc = "counter-clockwise positive headings) and the map image's local units."]

use core::f64::consts::PI;
use core::fmt;
use libm::{fabs, sqrt};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub mod error;
pub use error::FrameError;

/// A point in either the metric frame (m) or the local image frame (units).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    /// x coordinate.
    pub x: f64,
    /// y coordinate.
    pub y: f64,
}

impl Point {
    /// Construct a new point.
    pub const fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance_to(&self, other: Point) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        sqrt(dx * dx + dy * dy)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3})", self.x, self.y)
    }
}

/// Position `(x, y, z)` plus heading `theta`, as used for map origins and
/// localization reports.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose25D {
    /// x position (m).
    pub x: f64,
    /// y position (m).
    pub y: f64,
    /// Heading (rad), counter-clockwise from east.
    #[cfg_attr(feature = "serde", serde(default))]
    pub theta: f64,
    /// Height (m).
    #[cfg_attr(feature = "serde", serde(default))]
    pub z: f64,
}

impl Pose25D {
    /// Construct a new pose record.
    pub const fn new(x: f64, y: f64, theta: f64, z: f64) -> Self {
        Pose25D { x, y, theta, z }
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.theta.is_finite() && self.z.is_finite()
    }
}

/// A planar pose with a heading in degrees.
///
/// The heading is normalized to `[0, 360)` on every write, so a stored pose
/// never carries an out-of-range angle. Whether the angle is counter-clockwise
/// (metric frame) or clockwise (marker handle) depends on who owns the pose.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(from = "RawPose2D"))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose2D {
    /// x position.
    pub x: f64,
    /// y position.
    pub y: f64,
    angle_degrees: f64,
}

impl Pose2D {
    /// Construct a new pose. The angle is normalized to `[0, 360)`.
    pub fn new(x: f64, y: f64, angle_degrees: f64) -> Self {
        Pose2D {
            x,
            y,
            angle_degrees: normalize_degrees(angle_degrees),
        }
    }

    /// Build a metric pose from a record whose heading is in radians.
    pub fn from_pose25d(record: Pose25D) -> Self {
        Pose2D::new(record.x, record.y, record.theta.to_degrees())
    }

    /// Heading in degrees, always within `[0, 360)`.
    pub fn angle_degrees(&self) -> f64 {
        self.angle_degrees
    }

    /// Overwrite the heading. The angle is normalized to `[0, 360)`.
    pub fn set_angle_degrees(&mut self, angle_degrees: f64) {
        self.angle_degrees = normalize_degrees(angle_degrees);
    }

    /// Heading in radians, normalized to `[-PI, PI)`.
    pub fn theta_radians(&self) -> f64 {
        normalize_radians(self.angle_degrees.to_radians())
    }

    /// Position part of the pose.
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Euclidean distance between the positions of two poses.
    pub fn distance_to(&self, other: &Pose2D) -> f64 {
        self.position().distance_to(other.position())
    }
}

impl fmt::Display for Pose2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(x: {:.3}, y: {:.3}, θ: {:.1}°)", self.x, self.y, self.angle_degrees)
    }
}

/// Wire form of [`Pose2D`]; deserialization goes through [`Pose2D::new`].
#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct RawPose2D {
    x: f64,
    y: f64,
    #[serde(default)]
    angle_degrees: f64,
}

#[cfg(feature = "serde")]
impl From<RawPose2D> for Pose2D {
    fn from(raw: RawPose2D) -> Self {
        Pose2D::new(raw.x, raw.y, raw.angle_degrees)
    }
}

/// The metric frame of a loaded map image.
///
/// Local units are image pixels measured from the bottom-left corner of the
/// image with y pointing up, so `local = (metric - origin) / resolution` per
/// axis and no axis flip is involved.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(try_from = "RawMapFrame"))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapFrame {
    /// Meters per local unit, always positive.
    resolution: f64,
    /// Metric pose of local `(0, 0)`.
    origin: Pose25D,
    /// Natural image width in units.
    width: u32,
    /// Natural image height in units.
    height: u32,
}

impl MapFrame {
    /// Construct a new map frame.
    ///
    /// # Arguments
    ///
    /// * `resolution`: Meters per image unit.
    /// * `origin`: Metric pose of the bottom-left corner of the image.
    /// * `width`, `height`: Natural image dimensions in units.
    ///
    /// # Errors
    ///
    /// Returns `Err(FrameError::InvalidResolution)` if `resolution` is not a positive finite number.
    /// Returns `Err(FrameError::InvalidOrigin)` if any origin component is not finite.
    /// Returns `Err(FrameError::InvalidDimensions)` if `width` or `height` is zero.
    pub fn new(resolution: f64, origin: Pose25D, width: u32, height: u32) -> Result<Self, FrameError> {
        if !resolution.is_finite() || resolution <= 0.0 {
            return Err(FrameError::InvalidResolution(resolution));
        }
        if !origin.is_finite() {
            return Err(FrameError::InvalidOrigin("components must be finite"));
        }
        if width == 0 || height == 0 {
            return Err(FrameError::InvalidDimensions("width and height must be non-zero"));
        }
        Ok(MapFrame {
            resolution,
            origin,
            width,
            height,
        })
    }

    /// Meters per local unit.
    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    /// Metric pose of local `(0, 0)`.
    pub fn origin(&self) -> Pose25D {
        self.origin
    }

    /// Image width in units.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Image height in units.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Converts a metric point to local units.
    pub fn to_local(&self, metric: Point) -> Point {
        Point::new(
            (metric.x - self.origin.x) / self.resolution,
            (metric.y - self.origin.y) / self.resolution,
        )
    }

    /// Converts a local point back to the metric frame.
    pub fn to_metric(&self, local: Point) -> Point {
        Point::new(
            local.x * self.resolution + self.origin.x,
            local.y * self.resolution + self.origin.y,
        )
    }

    /// Converts a metric pose to a local pose. The heading is carried as is.
    pub fn pose_to_local(&self, metric: Pose2D) -> Pose2D {
        let p = self.to_local(metric.position());
        Pose2D::new(p.x, p.y, metric.angle_degrees())
    }

    /// Converts a local pose to a metric pose. The heading is carried as is.
    pub fn pose_to_metric(&self, local: Pose2D) -> Pose2D {
        let p = self.to_metric(local.position());
        Pose2D::new(p.x, p.y, local.angle_degrees())
    }

    /// Length in local units of a metric distance.
    pub fn meters_to_units(&self, meters: f64) -> f64 {
        meters / self.resolution
    }

    /// Metric length of a distance in local units.
    pub fn units_to_meters(&self, units: f64) -> f64 {
        units * self.resolution
    }

    /// Local bounds of the image as `(min, max)` corners.
    pub fn local_bounds(&self) -> (Point, Point) {
        (
            Point::new(0.0, 0.0),
            Point::new(self.width as f64, self.height as f64),
        )
    }

    /// Metric bounds of the image as `(min, max)` corners.
    pub fn metric_bounds(&self) -> (Point, Point) {
        let (min, max) = self.local_bounds();
        (self.to_metric(min), self.to_metric(max))
    }

    /// Whether a local point lies on the image.
    pub fn contains_local(&self, local: Point) -> bool {
        local.x >= 0.0
            && local.y >= 0.0
            && local.x < self.width as f64
            && local.y < self.height as f64
    }
}

impl fmt::Display for MapFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MapFrame ({}x{} @ {:.3} m, origin ({:.2}, {:.2}))",
            self.width, self.height, self.resolution, self.origin.x, self.origin.y
        )
    }
}

/// Wire form of [`MapFrame`]; deserialization is validated by [`MapFrame::new`].
#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct RawMapFrame {
    resolution: f64,
    origin: Pose25D,
    width: u32,
    height: u32,
}

#[cfg(feature = "serde")]
impl TryFrom<RawMapFrame> for MapFrame {
    type Error = FrameError;

    fn try_from(raw: RawMapFrame) -> Result<Self, Self::Error> {
        MapFrame::new(raw.resolution, raw.origin, raw.width, raw.height)
    }
}

/// Normalize an angle in degrees to `[0, 360)`.
///
/// Non-finite input normalizes to `0`.
pub fn normalize_degrees(angle: f64) -> f64 {
    if !angle.is_finite() {
        return 0.0;
    }
    let mut a = angle % 360.0;
    if a < 0.0 {
        a += 360.0;
    }
    // -1e-20 + 360.0 rounds to 360.0
    if a >= 360.0 { 0.0 } else { a }
}

/// Normalize an angle in radians to `[-PI, PI)`.
///
/// Angles at `PI` will be normalized to `-PI`.
pub fn normalize_radians(angle: f64) -> f64 {
    let a = angle % (2.0 * PI);
    if a >= PI {
        a - 2.0 * PI
    } else if a < -PI {
        a + 2.0 * PI
    } else {
        a
    }
}

/// Shortest absolute difference between two headings in degrees, in `[0, 180]`.
pub fn angle_delta_degrees(a: f64, b: f64) -> f64 {
    let d = fabs(normalize_degrees(a) - normalize_degrees(b));
    if d > 180.0 { 360.0 - d } else { d }
}

/// Converts a clockwise heading (screen handle convention) into a
/// counter-clockwise REP-103 heading: `(360 - raw) % 360`.
pub fn cw_to_ccw_degrees(raw: f64) -> f64 {
    (360.0 - normalize_degrees(raw)) % 360.0
}

/// Converts a counter-clockwise REP-103 heading into the clockwise handle
/// convention. The flip is its own inverse.
pub fn ccw_to_cw_degrees(angle: f64) -> f64 {
    cw_to_ccw_degrees(angle)
}

#[cfg(test)]
mod tests {
    use super::*;
    const EPSILON: f64 = 1e-6;

    fn sample_frame() -> MapFrame {
        MapFrame::new(0.05, Pose25D::new(-70.4, -64.0, 0.0, 0.0), 2816, 2560).unwrap()
    }

    #[test]
    fn test_origin_maps_to_local_zero() {
        let frame = sample_frame();
        let local = frame.to_local(Point::new(-70.4, -64.0));
        assert!(local.x.abs() < EPSILON);
        assert!(local.y.abs() < EPSILON);
    }

    #[test]
    fn test_to_local_scales_by_resolution() {
        let frame = sample_frame();
        // one meter east and two north of the origin
        let local = frame.to_local(Point::new(-69.4, -62.0));
        assert!((local.x - 20.0).abs() < EPSILON);
        assert!((local.y - 40.0).abs() < EPSILON);
    }

    #[test]
    fn test_round_trip_is_idempotent() {
        let frame = sample_frame();
        let points = [
            Point::new(0.0, 0.0),
            Point::new(-70.4, -64.0),
            Point::new(12.345, -7.5),
            Point::new(70.0, 63.95),
        ];
        for p in points {
            let local = frame.to_local(p);
            let again = frame.to_local(frame.to_metric(local));
            assert!((again.x - local.x).abs() < EPSILON, "x drifted for {}", p);
            assert!((again.y - local.y).abs() < EPSILON, "y drifted for {}", p);

            let metric = frame.to_metric(local);
            assert!((metric.x - p.x).abs() < EPSILON);
            assert!((metric.y - p.y).abs() < EPSILON);
        }
    }

    #[test]
    fn test_pose_conversion_keeps_heading() {
        let frame = sample_frame();
        let metric = Pose2D::new(1.0, 2.0, 135.0);
        let local = frame.pose_to_local(metric);
        assert!((local.angle_degrees() - 135.0).abs() < EPSILON);
        let back = frame.pose_to_metric(local);
        assert!((back.x - 1.0).abs() < EPSILON);
        assert!((back.y - 2.0).abs() < EPSILON);
        assert!((back.angle_degrees() - 135.0).abs() < EPSILON);
    }

    #[test]
    fn test_invalid_resolution() {
        let origin = Pose25D::default();
        assert_eq!(
            MapFrame::new(0.0, origin, 10, 10),
            Err(FrameError::InvalidResolution(0.0))
        );
        assert!(matches!(
            MapFrame::new(-0.05, origin, 10, 10),
            Err(FrameError::InvalidResolution(_))
        ));
        assert!(matches!(
            MapFrame::new(f64::NAN, origin, 10, 10),
            Err(FrameError::InvalidResolution(_))
        ));
    }

    #[test]
    fn test_invalid_origin_and_dimensions() {
        let bad_origin = Pose25D::new(f64::INFINITY, 0.0, 0.0, 0.0);
        assert!(matches!(
            MapFrame::new(0.05, bad_origin, 10, 10),
            Err(FrameError::InvalidOrigin(_))
        ));
        assert!(matches!(
            MapFrame::new(0.05, Pose25D::default(), 0, 10),
            Err(FrameError::InvalidDimensions(_))
        ));
    }

    #[test]
    fn test_bounds() {
        let frame = sample_frame();
        let (min, max) = frame.metric_bounds();
        assert!((min.x - -70.4).abs() < EPSILON);
        assert!((min.y - -64.0).abs() < EPSILON);
        assert!((max.x - (-70.4 + 2816.0 * 0.05)).abs() < EPSILON);
        assert!((max.y - (-64.0 + 2560.0 * 0.05)).abs() < EPSILON);

        assert!(frame.contains_local(Point::new(0.0, 0.0)));
        assert!(!frame.contains_local(Point::new(2816.0, 10.0)));
        assert!(!frame.contains_local(Point::new(-0.1, 10.0)));
    }

    #[test]
    fn test_meters_to_units() {
        let frame = sample_frame();
        assert!((frame.meters_to_units(0.9) - 18.0).abs() < EPSILON);
        assert!((frame.units_to_meters(18.0) - 0.9).abs() < EPSILON);
    }

    #[test]
    fn test_degree_normalization() {
        assert!((normalize_degrees(0.0) - 0.0).abs() < EPSILON);
        assert!((normalize_degrees(360.0) - 0.0).abs() < EPSILON);
        assert!((normalize_degrees(725.0) - 5.0).abs() < EPSILON);
        assert!((normalize_degrees(-90.0) - 270.0).abs() < EPSILON);
        assert!((normalize_degrees(-720.0) - 0.0).abs() < EPSILON);
        assert_eq!(normalize_degrees(f64::NAN), 0.0);
        let tiny = normalize_degrees(-1e-20);
        assert!((0.0..360.0).contains(&tiny));
    }

    #[test]
    fn test_set_angle_always_in_range() {
        let mut pose = Pose2D::new(0.0, 0.0, 0.0);
        for raw in [-1080.5, -360.0, -0.25, 0.0, 359.999, 360.0, 1234.5] {
            pose.set_angle_degrees(raw);
            let a = pose.angle_degrees();
            assert!((0.0..360.0).contains(&a), "{} normalized to {}", raw, a);
        }
    }

    #[test]
    fn test_radian_normalization() {
        assert!((normalize_radians(PI) - (-PI)).abs() < EPSILON);
        assert!((normalize_radians(2.5 * PI) - 0.5 * PI).abs() < EPSILON);
        assert!((normalize_radians(-2.5 * PI) - -0.5 * PI).abs() < EPSILON);
    }

    #[test]
    fn test_theta_radians() {
        assert!((Pose2D::new(0.0, 0.0, 90.0).theta_radians() - PI / 2.0).abs() < EPSILON);
        assert!((Pose2D::new(0.0, 0.0, 270.0).theta_radians() - -PI / 2.0).abs() < EPSILON);
        let from_record = Pose2D::from_pose25d(Pose25D::new(1.0, 2.0, -PI / 2.0, 0.0));
        assert!((from_record.angle_degrees() - 270.0).abs() < EPSILON);
    }

    #[test]
    fn test_handle_flip() {
        assert!((cw_to_ccw_degrees(0.0) - 0.0).abs() < EPSILON);
        assert!((cw_to_ccw_degrees(90.0) - 270.0).abs() < EPSILON);
        assert!((cw_to_ccw_degrees(270.0) - 90.0).abs() < EPSILON);
        assert!((cw_to_ccw_degrees(-90.0) - 90.0).abs() < EPSILON);
        for a in [0.0, 12.5, 180.0, 359.0] {
            assert!((ccw_to_cw_degrees(cw_to_ccw_degrees(a)) - a).abs() < EPSILON);
        }
    }

    #[test]
    fn test_angle_delta_wraps() {
        assert!((angle_delta_degrees(359.95, 0.0) - 0.05).abs() < EPSILON);
        assert!((angle_delta_degrees(10.0, 350.0) - 20.0).abs() < EPSILON);
        assert!((angle_delta_degrees(0.0, 180.0) - 180.0).abs() < EPSILON);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_deserialized_pose_is_normalized() {
        let pose: Pose2D = serde_json::from_str(r#"{"x":1.0,"y":2.0,"angle_degrees":720.5}"#).unwrap();
        assert!((pose.angle_degrees() - 0.5).abs() < EPSILON);
        let pose: Pose2D = serde_json::from_str(r#"{"x":1.0,"y":2.0,"angle_degrees":-90.0}"#).unwrap();
        assert!((pose.angle_degrees() - 270.0).abs() < EPSILON);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_deserialized_frame_is_validated() {
        let zero = r#"{"resolution":0.0,"origin":{"x":0.0,"y":0.0},"width":10,"height":10}"#;
        assert!(serde_json::from_str::<MapFrame>(zero).is_err());
        let empty = r#"{"resolution":0.05,"origin":{"x":0.0,"y":0.0},"width":0,"height":10}"#;
        assert!(serde_json::from_str::<MapFrame>(empty).is_err());

        let frame = sample_frame();
        let back: MapFrame = serde_json::from_str(&serde_json::to_string(&frame).unwrap()).unwrap();
        assert_eq!(back, frame);
    }
}
