//! Decoding of map images into RGBA pixel buffers.

use crate::error::LoadError;

/// A decoded map image. Row 0 is the top (north) edge of the map.
#[derive(Clone, PartialEq)]
pub struct MapImage {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl MapImage {
    /// Decode an encoded image (PNG, PGM/PPM or JPEG).
    pub fn decode(resource: &str, bytes: &[u8]) -> Result<Self, LoadError> {
        let dynamic = image::load_from_memory(bytes).map_err(|err| LoadError::Decode {
            resource: resource.to_string(),
            reason: err.to_string(),
        })?;
        let rgba = dynamic.into_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(Self {
            width,
            height,
            rgba: rgba.into_raw(),
        })
    }

    /// Natural width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Natural height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Tightly packed RGBA8 pixels, row-major from the top row.
    pub fn rgba(&self) -> &[u8] {
        &self.rgba
    }
}

impl std::fmt::Debug for MapImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.rgba.len())
            .finish()
    }
}
