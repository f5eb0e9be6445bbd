use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{trace, warn};

/// Broadcast topic with bounded capacity.
/// `T` must be `Send + Sync` because the worker and the render loop live on different threads.
#[derive(Debug, Clone)]
pub struct Topic<T> {
    tx: broadcast::Sender<Arc<T>>,
}

impl<T: Send + Sync + 'static> Topic<T> {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, msg: T) {
        if self.tx.send(Arc::new(msg)).is_err() {
            trace!("Published with no subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<T>> {
        self.tx.subscribe()
    }
}

/// Non-blocking drain of everything queued on `rx`.
///
/// Returns `None` once the channel is closed and empty. A lagged receiver
/// skips the overwritten messages and keeps the rest.
pub fn drain<T: Clone>(rx: &mut broadcast::Receiver<T>) -> Option<Vec<T>> {
    let mut out = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(msg) => out.push(msg),
            Err(broadcast::error::TryRecvError::Empty) => return Some(out),
            Err(broadcast::error::TryRecvError::Lagged(n)) => {
                warn!(skipped = n, "Receiver lagged");
            }
            Err(broadcast::error::TryRecvError::Closed) => {
                return if out.is_empty() { None } else { Some(out) };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_returns_in_order() {
        let topic: Topic<u32> = Topic::new(8);
        let mut rx = topic.subscribe();
        topic.publish(1);
        topic.publish(2);
        let got: Vec<u32> = drain(&mut rx).unwrap().into_iter().map(|m| *m).collect();
        assert_eq!(got, vec![1, 2]);
        assert_eq!(drain(&mut rx).unwrap().len(), 0);
    }

    #[test]
    fn drain_survives_lag() {
        let topic: Topic<u32> = Topic::new(2);
        let mut rx = topic.subscribe();
        for i in 0..5 {
            topic.publish(i);
        }
        let got: Vec<u32> = drain(&mut rx).unwrap().into_iter().map(|m| *m).collect();
        assert_eq!(got, vec![3, 4]);
    }

    #[test]
    fn drain_reports_closed() {
        let topic: Topic<u32> = Topic::new(2);
        let mut rx = topic.subscribe();
        drop(topic);
        assert!(drain(&mut rx).is_none());
    }
}
