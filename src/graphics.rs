use std::sync::Arc;

use amr_frame::{MapFrame, Point};
use amr_map::{CommitError, ErrorKind, LoadedMap};
use macroquad::prelude::*;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::blackboard::{Blackboard, snapshot};
use crate::bus::drain;
use crate::marker::{Grab, RobotDimensions, RobotMarker, handle_angle_degrees};
use crate::sync::{PoseSync, StatusLevel, StatusMessage, SyncThresholds};
use crate::viewport::Viewport;
use crate::worker::{Command, Event};

// Function to configure the macroquad window
pub fn window_conf() -> Conf {
    Conf {
        window_title: "AMR Map Viewer".to_string(),
        window_width: 1280,
        window_height: 800,
        high_dpi: true,
        ..Default::default()
    }
}

const ZOOM_STEP: f32 = 1.1;
const NUDGE_DEGREES: f64 = 1.0;
const HUD_FONT: f32 = 20.0;
const BANNER_HEIGHT: f32 = 36.0;

/// The loaded map as the display surface holds it. Replaced wholesale on reload.
struct MapView {
    name: String,
    frame: MapFrame,
    texture: Texture2D,
}

enum LoadState {
    Loading,
    Ready,
    Failed { message: String },
}

enum Gesture {
    Idle,
    Pan { last: Vec2 },
    /// Offset from pointer to marker centre, in local units.
    Drag { offset: Vec2, last: Vec2 },
    Rotate { last: Vec2 },
}

struct Surface {
    view: Option<MapView>,
    viewport: Viewport,
    sync: PoseSync,
    gesture: Gesture,
    load: LoadState,
    dims: RobotDimensions,
    commands: mpsc::Sender<Command>,
}

fn screen_size() -> Vec2 {
    vec2(screen_width(), screen_height())
}

fn to_point(v: Vec2) -> Point {
    Point::new(v.x as f64, v.y as f64)
}

fn to_vec2(p: Point) -> Vec2 {
    vec2(p.x as f32, p.y as f32)
}

impl Surface {
    fn on_event(&mut self, event: &Event) {
        match event {
            Event::Loading => {
                self.load = LoadState::Loading;
            }
            Event::MapLoaded(map) => self.install_map(map),
            Event::LoadFailed(err) => {
                let message = match err.kind() {
                    ErrorKind::DataUnavailable => err.to_string(),
                    ErrorKind::Network => format!("Network error: {}", err),
                };
                self.teardown_map();
                self.load = LoadState::Failed { message };
            }
            Event::Telemetry(pose) => {
                if self.sync.push_pose(*pose) {
                    debug!(%pose, "Marker updated from telemetry");
                }
            }
            Event::CommitFinished(result) => {
                self.sync.finish_commit(result.clone());
            }
        }
    }

    fn install_map(&mut self, map: &LoadedMap) {
        let (Ok(w), Ok(h)) = (u16::try_from(map.image.width()), u16::try_from(map.image.height())) else {
            warn!(width = map.image.width(), height = map.image.height(), "Map image too large for a texture");
            self.teardown_map();
            self.load = LoadState::Failed {
                message: format!("Map image '{}' is too large to display", map.map_id),
            };
            return;
        };
        let texture = Texture2D::from_rgba8(w, h, map.image.rgba());
        texture.set_filter(FilterMode::Nearest);

        let mut marker = RobotMarker::new(map.frame, self.dims);
        if let Some(pose) = map.robot_pose {
            marker.set_pose(pose);
        }
        self.sync.attach(marker);
        self.sync.clear_status();
        self.viewport = Viewport::fit(w as f32, h as f32, screen_size());
        self.view = Some(MapView {
            name: map.name.clone(),
            frame: map.frame,
            texture,
        });
        self.load = LoadState::Ready;
        info!(map = %map.name, "Map installed on display surface");
    }

    /// Drop the texture and marker of the current map.
    fn teardown_map(&mut self) {
        self.view = None;
        self.sync.detach();
        self.gesture = Gesture::Idle;
    }

    fn send(&mut self, cmd: Command) -> bool {
        match self.commands.try_send(cmd) {
            Ok(()) => true,
            Err(err) => {
                error!(%err, "Worker command channel unavailable");
                false
            }
        }
    }

    fn handle_input(&mut self) {
        let screen = screen_size();
        let mouse = Vec2::from(mouse_position());

        let (_, wheel) = mouse_wheel();
        if wheel != 0.0 {
            let factor = if wheel > 0.0 { ZOOM_STEP } else { 1.0 / ZOOM_STEP };
            self.viewport.zoom_at(mouse, factor, screen);
        }

        if is_mouse_button_pressed(MouseButton::Left) {
            let local = self.viewport.screen_to_local(mouse, screen);
            self.gesture = match self.sync.marker().and_then(|m| m.hit_test(to_point(local))) {
                Some(Grab::Handle) => Gesture::Rotate { last: mouse },
                Some(Grab::Body) => {
                    let centre = self.sync.marker().map(|m| to_vec2(m.local_pose().position()));
                    Gesture::Drag {
                        offset: centre.unwrap_or(local) - local,
                        last: mouse,
                    }
                }
                None => Gesture::Pan { last: mouse },
            };
        }
        if is_mouse_button_pressed(MouseButton::Right) || is_mouse_button_pressed(MouseButton::Middle) {
            self.gesture = Gesture::Pan { last: mouse };
        }

        let any_down = is_mouse_button_down(MouseButton::Left)
            || is_mouse_button_down(MouseButton::Right)
            || is_mouse_button_down(MouseButton::Middle);
        if any_down {
            match &mut self.gesture {
                Gesture::Idle => {}
                Gesture::Pan { last } => {
                    let delta = mouse - *last;
                    *last = mouse;
                    self.viewport.pan_by(delta);
                }
                Gesture::Drag { offset, last } => {
                    if mouse != *last {
                        *last = mouse;
                        let target = self.viewport.screen_to_local(mouse, screen) + *offset;
                        self.sync.drag_to(to_point(target));
                    }
                }
                Gesture::Rotate { last } => {
                    if mouse != *last {
                        *last = mouse;
                        let centre = self
                            .sync
                            .marker()
                            .map(|m| self.viewport.local_to_screen(to_vec2(m.local_pose().position()), screen));
                        if let Some(centre) = centre {
                            self.sync
                                .rotate_to(handle_angle_degrees((centre.x, centre.y), (mouse.x, mouse.y)));
                        }
                    }
                }
            }
        } else {
            self.gesture = Gesture::Idle;
        }

        if is_key_pressed(KeyCode::Q) {
            self.sync.nudge_heading(NUDGE_DEGREES);
        }
        if is_key_pressed(KeyCode::E) {
            self.sync.nudge_heading(-NUDGE_DEGREES);
        }
        if is_key_pressed(KeyCode::I) {
            self.commit();
        }
        if is_key_pressed(KeyCode::R) {
            info!("Retry requested by user");
            self.send(Command::Reload);
        }
        if is_key_pressed(KeyCode::Escape) {
            self.sync.discard_edit();
            self.sync.set_status(StatusMessage::info("Edit discarded"));
        }
        if is_key_pressed(KeyCode::F) {
            if let Some(view) = &self.view {
                self.viewport = Viewport::fit(view.frame.width() as f32, view.frame.height() as f32, screen);
            }
        }
    }

    fn commit(&mut self) {
        match self.sync.commit_request() {
            Ok(request) => {
                if !self.send(Command::Commit(request)) {
                    self.sync
                        .finish_commit(Err(CommitError::Network("background worker is not running".to_string())));
                }
            }
            Err(err) => self.sync.set_status(StatusMessage::error(err.to_string())),
        }
    }

    fn draw(&self, bb: &Blackboard) {
        clear_background(LIGHTGRAY);
        let screen = screen_size();

        if let Some(view) = &self.view {
            let rect = self.viewport.map_rect(view.frame.width() as f32, view.frame.height() as f32, screen);
            draw_texture_ex(
                &view.texture,
                rect.x,
                rect.y,
                WHITE,
                DrawTextureParams {
                    dest_size: Some(vec2(rect.w, rect.h)),
                    ..Default::default()
                },
            );
            draw_rectangle_lines(rect.x, rect.y, rect.w, rect.h, 1.0, DARKGRAY);
        }

        if let Some(marker) = self.sync.marker() {
            draw_marker(marker, &self.viewport, screen, self.sync.is_editing());
        }

        self.draw_hud(bb);
        self.draw_banner(screen);
    }

    fn draw_hud(&self, bb: &Blackboard) {
        let status = snapshot(bb);
        let mut y = BANNER_HEIGHT + 20.0;
        let mut line = |text: &str, color: Color| {
            draw_text(text, 10.0, y, HUD_FONT, color);
            y += HUD_FONT + 2.0;
        };

        if let Some(view) = &self.view {
            line(&format!("Map: {} ({})", view.name, view.frame), BLACK);
        }
        if let Some(marker) = self.sync.marker() {
            let pose = marker.get_pose();
            let suffix = if self.sync.commit_in_flight() {
                "  [commit pending]"
            } else if self.sync.is_editing() {
                "  [edited]"
            } else {
                ""
            };
            line(
                &format!("Robot: x={:.3} m y={:.3} m θ={:.1}°{}", pose.x, pose.y, pose.angle_degrees(), suffix),
                BLACK,
            );
        }
        let confidence = status
            .confidence
            .map(|c| format!("{:.0}%", c * 100.0))
            .unwrap_or_else(|| "n/a".to_string());
        line(
            &format!(
                "Localized: {}  confidence: {}",
                if status.localized { "yes" } else { "no" },
                confidence
            ),
            if status.localized { DARKGREEN } else { MAROON },
        );
        for fault in &status.faults {
            line(&format!("Fault: {}", fault), RED);
        }
        if let Some(msg) = self.sync.status() {
            let color = match msg.level {
                StatusLevel::Info => DARKBLUE,
                StatusLevel::Success => DARKGREEN,
                StatusLevel::Error => RED,
            };
            line(&msg.text, color);
        }
        draw_text(
            "drag marker: move | drag handle / Q E: rotate | I: initialize localization | Esc: discard | R: reload | F: fit",
            10.0,
            screen_height() - 10.0,
            16.0,
            DARKGRAY,
        );
    }

    fn draw_banner(&self, screen: Vec2) {
        let (text, background) = match &self.load {
            LoadState::Ready => return,
            LoadState::Loading => ("Loading map...".to_string(), Color::new(0.1, 0.3, 0.6, 0.9)),
            LoadState::Failed { message } => (
                format!("{}  (press R to retry)", message),
                Color::new(0.7, 0.1, 0.1, 0.95),
            ),
        };
        draw_rectangle(0.0, 0.0, screen.x, BANNER_HEIGHT, background);
        draw_text(&text, 10.0, BANNER_HEIGHT - 11.0, 22.0, WHITE);
    }
}

/// Rendering adapter for the marker: a triangle pointing along the heading and
/// a round rotate handle ahead of the nose.
fn draw_marker(marker: &RobotMarker, viewport: &Viewport, screen: Vec2, editing: bool) {
    let centre = viewport.local_to_screen(to_vec2(marker.local_pose().position()), screen);
    // clockwise handle angle is already a screen-space (y down) angle
    let theta = (marker.rotation() as f32).to_radians();
    let dir = vec2(theta.cos(), theta.sin());
    let perp = vec2(-dir.y, dir.x);
    let half_len = marker.length_units() as f32 * viewport.pixels_per_unit / 2.0;
    let half_width = marker.width_units() as f32 * viewport.pixels_per_unit / 2.0;

    let nose = centre + dir * half_len;
    let rear_left = centre - dir * half_len + perp * half_width;
    let rear_right = centre - dir * half_len - perp * half_width;
    let fill = if editing { ORANGE } else { BLUE };
    draw_triangle(nose, rear_left, rear_right, fill);
    draw_triangle_lines(nose, rear_left, rear_right, 2.0, DARKBLUE);

    let handle = viewport.local_to_screen(to_vec2(marker.handle_position()), screen);
    let handle_r = (marker.handle_radius() as f32 * viewport.pixels_per_unit).max(3.0);
    draw_line(nose.x, nose.y, handle.x, handle.y, 1.5, DARKBLUE);
    draw_circle(handle.x, handle.y, handle_r, if editing { ORANGE } else { SKYBLUE });
    draw_circle_lines(handle.x, handle.y, handle_r, 1.5, DARKBLUE);
}

pub async fn run_visualization_loop(
    mut events_rx: broadcast::Receiver<Arc<Event>>,
    bb: Blackboard,
    commands: mpsc::Sender<Command>,
    dims: RobotDimensions,
    thresholds: SyncThresholds,
) {
    info!("Visualization loop starting inside graphics module...");
    prevent_quit();

    let mut surface = Surface {
        view: None,
        viewport: Viewport::default(),
        sync: PoseSync::new(thresholds),
        gesture: Gesture::Idle,
        load: LoadState::Loading,
        dims,
        commands,
    };
    let mut worker_alive = true;

    loop {
        if worker_alive {
            match drain(&mut events_rx) {
                Some(events) => {
                    for event in events {
                        surface.on_event(&event);
                    }
                }
                None => {
                    error!("Worker event channel closed.");
                    worker_alive = false;
                    surface
                        .sync
                        .set_status(StatusMessage::error("Background worker stopped; restart the viewer"));
                }
            }
        }

        surface.handle_input();
        surface.draw(&bb);

        if is_quit_requested() {
            info!("Quit requested, tearing down display surface.");
            break;
        }
        next_frame().await
    }

    surface.teardown_map();
    surface.send(Command::Shutdown);
}
