//! Map loading and robot-service access for the AMR map viewer.
//!
//! [`load_map`] resolves the robot's current map into a decoded image plus a
//! [`amr_frame::MapFrame`]; [`EdgeApi`] is the seam to the robot's HTTP services.

pub mod api;
pub mod error;
pub mod loader;
pub mod map_image;
pub mod state;

pub use api::{EdgeApi, HttpEdgeApi};
pub use error::{CommitError, ErrorKind, LoadError};
pub use loader::{LoadedMap, load_map};
pub use map_image::MapImage;
pub use state::{AmrState, CommitAck, InitializeRequest, InitializeResponse, Localization, MapInfo};
