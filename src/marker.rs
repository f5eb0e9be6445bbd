//! The robot marker: a plain pose holder placed on the map.
//!
//! The marker keeps only its display-local position and the raw angle produced
//! by its rotate handle. That handle works in screen space (y down), so its
//! angles are clockwise; every metric-facing method flips them into REP-103
//! (counter-clockwise) with `(360 - raw) % 360`.

use amr_frame::{MapFrame, Point, Pose2D, ccw_to_cw_degrees, cw_to_ccw_degrees, normalize_degrees};

/// Physical footprint of the robot, used to size the marker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RobotDimensions {
    pub length_m: f64,
    pub width_m: f64,
}

/// Which part of the marker a pointer landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grab {
    Body,
    Handle,
}

#[derive(Debug, Clone)]
pub struct RobotMarker {
    frame: MapFrame,
    position: Point,
    /// Clockwise handle angle in `[0, 360)`.
    rotation: f64,
    length_units: f64,
    width_units: f64,
}

impl RobotMarker {
    pub fn new(frame: MapFrame, dims: RobotDimensions) -> Self {
        let (min, max) = frame.local_bounds();
        RobotMarker {
            frame,
            position: Point::new((min.x + max.x) / 2.0, (min.y + max.y) / 2.0),
            rotation: 0.0,
            length_units: frame.meters_to_units(dims.length_m),
            width_units: frame.meters_to_units(dims.width_m),
        }
    }

    /// Place the marker at a metric pose.
    pub fn set_pose(&mut self, metric: Pose2D) {
        let local = self.frame.pose_to_local(metric);
        self.position = local.position();
        self.rotation = ccw_to_cw_degrees(local.angle_degrees());
    }

    /// Current metric pose (REP-103 heading).
    pub fn get_pose(&self) -> Pose2D {
        let local = Pose2D::new(self.position.x, self.position.y, cw_to_ccw_degrees(self.rotation));
        self.frame.pose_to_metric(local)
    }

    /// Set the heading from a REP-103 (counter-clockwise) angle.
    pub fn rotate(&mut self, angle_degrees: f64) {
        self.rotation = ccw_to_cw_degrees(angle_degrees);
    }

    /// Set the raw clockwise handle angle.
    pub fn set_rotation(&mut self, raw_degrees: f64) {
        self.rotation = normalize_degrees(raw_degrees);
    }

    /// Raw clockwise handle angle, in `[0, 360)`.
    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    /// Move the marker to a display-local position (drag).
    pub fn set_local_position(&mut self, local: Point) {
        self.position = local;
    }

    /// Display-local pose; the angle is the raw clockwise handle angle.
    pub fn local_pose(&self) -> Pose2D {
        Pose2D::new(self.position.x, self.position.y, self.rotation)
    }

    pub fn length_units(&self) -> f64 {
        self.length_units
    }

    pub fn width_units(&self) -> f64 {
        self.width_units
    }

    /// Unit vector of the heading in local (y-up) coordinates.
    pub fn heading_vector(&self) -> Point {
        let theta = cw_to_ccw_degrees(self.rotation).to_radians();
        Point::new(theta.cos(), theta.sin())
    }

    /// Radius of the circle the body is hit-tested against.
    pub fn body_radius(&self) -> f64 {
        self.length_units.max(self.width_units) / 2.0
    }

    /// Where the rotate handle sits, ahead of the nose.
    pub fn handle_position(&self) -> Point {
        let dir = self.heading_vector();
        let reach = self.length_units * 0.75 + self.handle_radius();
        Point::new(self.position.x + dir.x * reach, self.position.y + dir.y * reach)
    }

    pub fn handle_radius(&self) -> f64 {
        self.width_units.max(1.0) * 0.25
    }

    /// Hit-test a local point. The handle wins over the body where they overlap.
    pub fn hit_test(&self, local: Point) -> Option<Grab> {
        if local.distance_to(self.handle_position()) <= self.handle_radius() * 1.5 {
            Some(Grab::Handle)
        } else if local.distance_to(self.position) <= self.body_radius() {
            Some(Grab::Body)
        } else {
            None
        }
    }
}

/// Angle of `pointer` around `center`, both in screen coordinates (y down).
///
/// Because screen y grows downwards the result is clockwise from east, the
/// same convention as [`RobotMarker::set_rotation`].
pub fn handle_angle_degrees(center: (f32, f32), pointer: (f32, f32)) -> f64 {
    let dx = (pointer.0 - center.0) as f64;
    let dy = (pointer.1 - center.1) as f64;
    normalize_degrees(dy.atan2(dx).to_degrees())
}
