use std::time::{Duration, Instant};

use amr_frame::Pose2D;
use amr_map::{CommitAck, CommitError, EdgeApi, InitializeRequest, LoadError, LoadedMap, load_map};
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::blackboard::{Blackboard, clear_fault, raise_fault, snapshot, touch_telemetry};
use crate::bus::Topic;

pub const FAULT_TELEMETRY_TIMEOUT: &str = "telemetry timeout";
pub const FAULT_TELEMETRY_UNAVAILABLE: &str = "telemetry unavailable";
pub const FAULT_MAP_CHANGED: &str = "robot switched maps, press R to reload";

/// Requests from the render loop.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Re-run the whole initial load sequence.
    Reload,
    Commit(InitializeRequest),
    Shutdown,
}

/// Results published back to the render loop.
#[derive(Debug)]
pub enum Event {
    Loading,
    MapLoaded(LoadedMap),
    LoadFailed(LoadError),
    /// Metric robot pose from telemetry.
    Telemetry(Pose2D),
    CommitFinished(Result<CommitAck, CommitError>),
}

#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    pub poll_interval: Duration,
    pub telemetry_timeout: Duration,
}

struct Loaded {
    map_id: String,
    at: Instant,
}

/// Background I/O loop. All requests to the robot go through here.
pub async fn run_worker<A: EdgeApi>(
    api: A,
    bb: Blackboard,
    mut commands: mpsc::Receiver<Command>,
    events: Topic<Event>,
    settings: WorkerSettings,
) -> anyhow::Result<()> {
    info!(
        poll_ms = settings.poll_interval.as_millis() as u64,
        "Worker started."
    );
    let mut loaded = load(&api, &bb, &events).await;

    let mut poll = time::interval(settings.poll_interval);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut watchdog = time::interval(Duration::from_millis(250));
    watchdog.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = poll.tick(), if loaded.is_some() => {
                if let Some(current) = &loaded {
                    poll_telemetry(&api, &bb, &events, &current.map_id).await;
                }
            }
            _ = watchdog.tick(), if loaded.is_some() => {
                if let Some(current) = &loaded {
                    check_telemetry_age(&bb, current.at, settings.telemetry_timeout);
                }
            }
            cmd = commands.recv() => {
                match cmd {
                    Some(Command::Reload) => {
                        info!("Reload requested.");
                        loaded = load(&api, &bb, &events).await;
                    }
                    Some(Command::Commit(request)) => {
                        let result = api.initialize_localization(&request).await;
                        events.publish(Event::CommitFinished(result));
                    }
                    Some(Command::Shutdown) | None => {
                        info!("Worker shutting down.");
                        break;
                    }
                }
            }
        }
    }
    Ok(())
}

async fn load<A: EdgeApi>(api: &A, bb: &Blackboard, events: &Topic<Event>) -> Option<Loaded> {
    events.publish(Event::Loading);
    clear_fault(bb, FAULT_MAP_CHANGED);
    match load_map(api).await {
        Ok(map) => {
            touch_telemetry(bb, map.localized, map.confidence);
            let loaded = Loaded {
                map_id: map.map_id.clone(),
                at: Instant::now(),
            };
            events.publish(Event::MapLoaded(map));
            Some(loaded)
        }
        Err(err) => {
            events.publish(Event::LoadFailed(err));
            None
        }
    }
}

async fn poll_telemetry<A: EdgeApi>(api: &A, bb: &Blackboard, events: &Topic<Event>, map_id: &str) {
    let state = match api.fetch_state().await {
        Ok(state) => state,
        Err(err) => {
            warn!(%err, "Telemetry poll failed");
            raise_fault(bb, FAULT_TELEMETRY_UNAVAILABLE);
            return;
        }
    };
    clear_fault(bb, FAULT_TELEMETRY_UNAVAILABLE);

    let Some(localization) = state.localization else {
        debug!("Telemetry without localization block");
        return;
    };
    touch_telemetry(bb, localization.localized, localization.confidence);

    let reported_map = localization.map.as_ref().and_then(|m| m.data.as_deref());
    if reported_map.is_some_and(|id| id != map_id) {
        warn!(loaded = map_id, reported = ?reported_map, "Robot reports a different map");
        raise_fault(bb, FAULT_MAP_CHANGED);
        // pose is in the other map's frame
        return;
    }

    if let Some(pose) = localization.robot_pose() {
        events.publish(Event::Telemetry(pose));
    }
}

fn check_telemetry_age(bb: &Blackboard, loaded_at: Instant, timeout: Duration) {
    let last = snapshot(bb).last_telemetry_ts.unwrap_or(loaded_at);
    let age = Instant::now().saturating_duration_since(last);
    if age > timeout {
        warn!(?age, "No telemetry within timeout");
        raise_fault(bb, FAULT_TELEMETRY_TIMEOUT);
    } else {
        clear_fault(bb, FAULT_TELEMETRY_TIMEOUT);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amr_frame::Pose25D;
    use amr_map::{AmrState, Localization, MapInfo};
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tokio::sync::broadcast;

    struct ScriptedEdge {
        state: Mutex<AmrState>,
        commit: Result<CommitAck, CommitError>,
        commits: Mutex<Vec<InitializeRequest>>,
    }

    impl EdgeApi for ScriptedEdge {
        async fn fetch_state(&self) -> Result<AmrState, LoadError> {
            Ok(self.state.lock().clone())
        }

        async fn fetch_map_image(&self, _map_id: &str) -> Result<Vec<u8>, LoadError> {
            Ok(pgm_bytes(8, 6))
        }

        async fn initialize_localization(&self, request: &InitializeRequest) -> Result<CommitAck, CommitError> {
            self.commits.lock().push(*request);
            self.commit.clone()
        }
    }

    /// Binary PGM, the format map_server writes.
    fn pgm_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut out = format!("P5\n{} {}\n255\n", width, height).into_bytes();
        out.extend(vec![205u8; (width * height) as usize]);
        out
    }

    fn state(resolution: Option<f64>) -> AmrState {
        AmrState {
            localization: Some(Localization {
                localized: true,
                confidence: Some(0.9),
                map: Some(MapInfo {
                    data: Some("lab".into()),
                    resolution,
                    origin: Some(Pose25D::new(-1.0, -1.0, 0.0, 0.0)),
                    name: Some("Lab".into()),
                }),
                pose: Some(Pose25D::new(0.5, 0.25, 0.0, 0.0)),
            }),
        }
    }

    fn spawn(
        edge: Arc<ScriptedEdge>,
    ) -> (
        mpsc::Sender<Command>,
        broadcast::Receiver<Arc<Event>>,
        tokio::task::JoinHandle<anyhow::Result<()>>,
        Blackboard,
    ) {
        let bb: Blackboard = Arc::default();
        let events: Topic<Event> = Topic::new(64);
        let rx = events.subscribe();
        let (tx, cmd_rx) = mpsc::channel(8);
        let settings = WorkerSettings {
            poll_interval: Duration::from_millis(20),
            telemetry_timeout: Duration::from_secs(5),
        };
        let handle = tokio::spawn(run_worker(edge, bb.clone(), cmd_rx, events, settings));
        (tx, rx, handle, bb)
    }

    async fn next_event(rx: &mut broadcast::Receiver<Arc<Event>>) -> Arc<Event> {
        time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    async fn next_matching(
        rx: &mut broadcast::Receiver<Arc<Event>>,
        pred: impl Fn(&Event) -> bool,
    ) -> Arc<Event> {
        loop {
            let ev = next_event(rx).await;
            if pred(&ev) {
                return ev;
            }
        }
    }

    fn edge(resolution: Option<f64>, commit: Result<CommitAck, CommitError>) -> Arc<ScriptedEdge> {
        Arc::new(ScriptedEdge {
            state: Mutex::new(state(resolution)),
            commit,
            commits: Mutex::new(Vec::new()),
        })
    }

    #[tokio::test]
    async fn initial_load_then_telemetry() {
        let (tx, mut rx, handle, bb) = spawn(edge(Some(0.05), Ok(CommitAck::Confirmed)));
        assert!(matches!(*next_event(&mut rx).await, Event::Loading));
        match &*next_event(&mut rx).await {
            Event::MapLoaded(map) => {
                assert_eq!(map.map_id, "lab");
                assert_eq!(map.frame.width(), 8);
                assert_eq!(map.frame.height(), 6);
            }
            other => panic!("unexpected event {:?}", other),
        }
        let ev = next_matching(&mut rx, |e| matches!(e, Event::Telemetry(_))).await;
        if let Event::Telemetry(pose) = &*ev {
            assert!((pose.x - 0.5).abs() < 1e-9);
        }
        assert!(snapshot(&bb).localized);

        tx.send(Command::Shutdown).await.unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn failed_load_then_manual_retry() {
        let scripted = edge(None, Ok(CommitAck::Confirmed));
        let (tx, mut rx, handle, _bb) = spawn(scripted.clone());
        let ev = next_matching(&mut rx, |e| matches!(e, Event::LoadFailed(_))).await;
        assert!(matches!(&*ev, Event::LoadFailed(LoadError::NoResolution)));

        *scripted.state.lock() = state(Some(0.05));
        tx.send(Command::Reload).await.unwrap();
        next_matching(&mut rx, |e| matches!(e, Event::MapLoaded(_))).await;

        drop(tx);
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn commit_failure_is_reported() {
        let scripted = edge(Some(0.05), Err(CommitError::from_status(422)));
        let (tx, mut rx, handle, _bb) = spawn(scripted.clone());
        next_matching(&mut rx, |e| matches!(e, Event::MapLoaded(_))).await;

        let request = InitializeRequest {
            x: 1.0,
            y: 2.0,
            theta: 0.5,
        };
        tx.send(Command::Commit(request)).await.unwrap();
        let ev = next_matching(&mut rx, |e| matches!(e, Event::CommitFinished(_))).await;
        match &*ev {
            Event::CommitFinished(Err(err)) => assert!(err.to_string().starts_with("Validation error")),
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(*scripted.commits.lock(), vec![request]);

        tx.send(Command::Shutdown).await.unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn map_switch_raises_fault_and_drops_foreign_poses() {
        let scripted = edge(Some(0.05), Ok(CommitAck::Confirmed));
        let (tx, mut rx, handle, bb) = spawn(scripted.clone());
        next_matching(&mut rx, |e| matches!(e, Event::MapLoaded(_))).await;

        if let Some(loc) = scripted.state.lock().localization.as_mut() {
            loc.pose = Some(Pose25D::new(500.0, 500.0, 0.0, 0.0));
            if let Some(map) = loc.map.as_mut() {
                map.data = Some("other".into());
            }
        }

        time::timeout(Duration::from_secs(2), async {
            while !snapshot(&bb).faults.iter().any(|f| f == FAULT_MAP_CHANGED) {
                time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("map switch fault never raised");
        // several more poll intervals
        time::sleep(Duration::from_millis(100)).await;

        while let Ok(ev) = rx.try_recv() {
            if let Event::Telemetry(pose) = &*ev {
                assert!(pose.x < 100.0, "pose from another map delivered: {}", pose);
            }
        }

        tx.send(Command::Shutdown).await.unwrap();
        handle.await.unwrap().unwrap();
    }

    #[test]
    fn stale_telemetry_raises_timeout() {
        let bb: Blackboard = Arc::default();
        let long_ago = Instant::now() - Duration::from_secs(10);
        check_telemetry_age(&bb, long_ago, Duration::from_secs(3));
        assert!(snapshot(&bb).faults.iter().any(|f| f == FAULT_TELEMETRY_TIMEOUT));

        touch_telemetry(&bb, true, None);
        check_telemetry_age(&bb, long_ago, Duration::from_secs(3));
        assert!(snapshot(&bb).faults.is_empty());
    }
}
