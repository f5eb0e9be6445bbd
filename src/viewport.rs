use macroquad::prelude::{Rect, Vec2, vec2};

const MIN_PIXELS_PER_UNIT: f32 = 0.05;
const MAX_PIXELS_PER_UNIT: f32 = 64.0;
const FIT_MARGIN: f32 = 0.95;

/// Pan/zoom state of the map canvas.
///
/// Local units are map pixels with y pointing up; screen pixels have y
/// pointing down. The screen centre always shows `center`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub center: Vec2,
    pub pixels_per_unit: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Viewport {
            center: Vec2::ZERO,
            pixels_per_unit: 1.0,
        }
    }
}

impl Viewport {
    /// Fit a `width x height` map into a `screen` sized window.
    pub fn fit(width: f32, height: f32, screen: Vec2) -> Self {
        let ppu = if width > 0.0 && height > 0.0 {
            (screen.x / width).min(screen.y / height) * FIT_MARGIN
        } else {
            1.0
        };
        Viewport {
            center: vec2(width / 2.0, height / 2.0),
            pixels_per_unit: ppu.clamp(MIN_PIXELS_PER_UNIT, MAX_PIXELS_PER_UNIT),
        }
    }

    pub fn screen_to_local(&self, screen_pos: Vec2, screen: Vec2) -> Vec2 {
        vec2(
            self.center.x + (screen_pos.x - screen.x / 2.0) / self.pixels_per_unit,
            self.center.y - (screen_pos.y - screen.y / 2.0) / self.pixels_per_unit,
        )
    }

    pub fn local_to_screen(&self, local: Vec2, screen: Vec2) -> Vec2 {
        vec2(
            screen.x / 2.0 + (local.x - self.center.x) * self.pixels_per_unit,
            screen.y / 2.0 - (local.y - self.center.y) * self.pixels_per_unit,
        )
    }

    /// Zoom by `factor` keeping the content under `cursor` in place.
    pub fn zoom_at(&mut self, cursor: Vec2, factor: f32, screen: Vec2) {
        let anchor = self.screen_to_local(cursor, screen);
        self.pixels_per_unit =
            (self.pixels_per_unit * factor).clamp(MIN_PIXELS_PER_UNIT, MAX_PIXELS_PER_UNIT);
        self.center = vec2(
            anchor.x - (cursor.x - screen.x / 2.0) / self.pixels_per_unit,
            anchor.y + (cursor.y - screen.y / 2.0) / self.pixels_per_unit,
        );
    }

    /// Move the content along with a pointer drag of `delta` screen pixels.
    pub fn pan_by(&mut self, delta: Vec2) {
        self.center.x -= delta.x / self.pixels_per_unit;
        self.center.y += delta.y / self.pixels_per_unit;
    }

    /// Screen rectangle covered by a `width x height` map anchored at local `(0, 0)`.
    pub fn map_rect(&self, width: f32, height: f32, screen: Vec2) -> Rect {
        let top_left = self.local_to_screen(vec2(0.0, height), screen);
        Rect::new(
            top_left.x,
            top_left.y,
            width * self.pixels_per_unit,
            height * self.pixels_per_unit,
        )
    }
}
