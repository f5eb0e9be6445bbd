//! The initial map load sequence.
//!
//! state -> localization -> map metadata -> image -> frame. Any missing piece
//! aborts the sequence with a distinct [`LoadError`]; in particular a missing
//! resolution stops before the image is requested.

use amr_frame::{MapFrame, Pose2D};
use tracing::{error, info, instrument};

use crate::api::EdgeApi;
use crate::error::LoadError;
use crate::map_image::MapImage;

/// Everything the viewer needs after a successful load.
#[derive(Debug, Clone)]
pub struct LoadedMap {
    /// Identifier the image was fetched with.
    pub map_id: String,
    /// Display name, falls back to the identifier.
    pub name: String,
    /// Metric frame built from the metadata and the image dimensions.
    pub frame: MapFrame,
    /// Decoded image.
    pub image: MapImage,
    /// Robot pose at load time, if the robot reported one.
    pub robot_pose: Option<Pose2D>,
    /// Localization flag at load time.
    pub localized: bool,
    /// Localization confidence at load time.
    pub confidence: Option<f64>,
}

/// Run the full load sequence against `api`.
#[instrument(skip_all)]
pub async fn load_map<A: EdgeApi>(api: &A) -> Result<LoadedMap, LoadError> {
    let result = load_map_inner(api).await;
    if let Err(err) = &result {
        error!(%err, kind = ?err.kind(), "Map load failed");
    }
    result
}

async fn load_map_inner<A: EdgeApi>(api: &A) -> Result<LoadedMap, LoadError> {
    let state = api.fetch_state().await?;
    let localization = state.localization.ok_or(LoadError::NoLocalization)?;
    let map = localization.map.clone().ok_or(LoadError::NoMap)?;
    let map_id = map.data.filter(|id| !id.is_empty()).ok_or(LoadError::NoMapId)?;
    let resolution = map.resolution.ok_or(LoadError::NoResolution)?;
    let origin = map.origin.ok_or(LoadError::NoOrigin)?;
    if !resolution.is_finite() || resolution <= 0.0 {
        return Err(LoadError::InvalidFrame(amr_frame::FrameError::InvalidResolution(resolution)));
    }

    info!(%map_id, resolution, origin_x = origin.x, origin_y = origin.y, "Fetching map image");
    let bytes = api.fetch_map_image(&map_id).await?;
    let image = MapImage::decode(&format!("map image '{}'", map_id), &bytes)?;
    let frame = MapFrame::new(resolution, origin, image.width(), image.height())?;

    info!(%map_id, %frame, "Map loaded");
    Ok(LoadedMap {
        name: map.name.filter(|n| !n.is_empty()).unwrap_or_else(|| map_id.clone()),
        map_id,
        frame,
        image,
        robot_pose: localization.robot_pose(),
        localized: localization.localized,
        confidence: localization.confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CommitError, ErrorKind};
    use crate::map_image::tests::png_bytes;
    use crate::state::{AmrState, CommitAck, InitializeRequest, Localization, MapInfo};
    use amr_frame::{FrameError, Pose25D};
    use parking_lot::Mutex;

    const EPSILON: f64 = 1e-6;

    struct FakeEdge {
        state: Result<AmrState, LoadError>,
        image: Result<Vec<u8>, LoadError>,
        image_requests: Mutex<Vec<String>>,
    }

    impl FakeEdge {
        fn new(state: AmrState) -> Self {
            Self {
                state: Ok(state),
                image: Ok(png_bytes(40, 20)),
                image_requests: Mutex::new(Vec::new()),
            }
        }
    }

    impl EdgeApi for FakeEdge {
        async fn fetch_state(&self) -> Result<AmrState, LoadError> {
            self.state.clone()
        }

        async fn fetch_map_image(&self, map_id: &str) -> Result<Vec<u8>, LoadError> {
            self.image_requests.lock().push(map_id.to_string());
            self.image.clone()
        }

        async fn initialize_localization(&self, _request: &InitializeRequest) -> Result<CommitAck, CommitError> {
            Ok(CommitAck::Confirmed)
        }
    }

    fn state_with(map: MapInfo) -> AmrState {
        AmrState {
            localization: Some(Localization {
                localized: true,
                confidence: Some(0.8),
                map: Some(map),
                pose: Some(Pose25D::new(-69.4, -63.0, 0.0, 0.0)),
            }),
        }
    }

    fn good_map() -> MapInfo {
        MapInfo {
            data: Some("warehouse-3".into()),
            resolution: Some(0.05),
            origin: Some(Pose25D::new(-70.4, -64.0, 0.0, 0.0)),
            name: Some("Warehouse".into()),
        }
    }

    #[tokio::test]
    async fn loads_map_and_frame() {
        let api = FakeEdge::new(state_with(good_map()));
        let loaded = load_map(&api).await.unwrap();
        assert_eq!(loaded.map_id, "warehouse-3");
        assert_eq!(loaded.name, "Warehouse");
        assert_eq!(loaded.frame.width(), 40);
        assert_eq!(loaded.frame.height(), 20);
        assert!((loaded.frame.resolution() - 0.05).abs() < EPSILON);
        let pose = loaded.robot_pose.unwrap();
        let local = loaded.frame.pose_to_local(pose);
        assert!((local.x - 20.0).abs() < EPSILON);
        assert!((local.y - 20.0).abs() < EPSILON);
        assert_eq!(*api.image_requests.lock(), vec!["warehouse-3".to_string()]);
    }

    #[tokio::test]
    async fn missing_resolution_halts_before_image() {
        let mut map = good_map();
        map.resolution = None;
        let api = FakeEdge::new(state_with(map));
        let err = load_map(&api).await.unwrap_err();
        assert_eq!(err, LoadError::NoResolution);
        assert_eq!(err.to_string(), "No map resolution available");
        assert!(api.image_requests.lock().is_empty());
    }

    #[tokio::test]
    async fn zero_resolution_is_data_unavailable() {
        let mut map = good_map();
        map.resolution = Some(0.0);
        let api = FakeEdge::new(state_with(map));
        let err = load_map(&api).await.unwrap_err();
        assert_eq!(err, LoadError::InvalidFrame(FrameError::InvalidResolution(0.0)));
        assert_eq!(err.kind(), ErrorKind::DataUnavailable);
        assert!(api.image_requests.lock().is_empty());
    }

    #[tokio::test]
    async fn missing_pieces_have_distinct_errors() {
        let api = FakeEdge::new(AmrState::default());
        assert_eq!(load_map(&api).await.unwrap_err(), LoadError::NoLocalization);

        let api = FakeEdge::new(AmrState {
            localization: Some(Localization::default()),
        });
        assert_eq!(load_map(&api).await.unwrap_err(), LoadError::NoMap);

        let mut map = good_map();
        map.data = None;
        let api = FakeEdge::new(state_with(map));
        assert_eq!(load_map(&api).await.unwrap_err(), LoadError::NoMapId);

        let mut map = good_map();
        map.origin = None;
        let api = FakeEdge::new(state_with(map));
        assert_eq!(load_map(&api).await.unwrap_err(), LoadError::NoOrigin);
    }

    #[tokio::test]
    async fn image_failure_names_the_resource() {
        let mut api = FakeEdge::new(state_with(good_map()));
        api.image = Err(LoadError::Status {
            resource: "map image 'warehouse-3'".into(),
            status: 404,
        });
        let err = load_map(&api).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
        assert!(err.to_string().contains("warehouse-3"));
    }

    #[tokio::test]
    async fn name_falls_back_to_map_id() {
        let mut map = good_map();
        map.name = None;
        let api = FakeEdge::new(state_with(map));
        assert_eq!(load_map(&api).await.unwrap().name, "warehouse-3");
    }
}
