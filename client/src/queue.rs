//! Ordered buffer of raw inbound frames shared between the transport's
//! receive task and the reconciliation loop.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Append-only FIFO of raw frames.
///
/// The producer only ever pushes to the tail. The consumer takes a snapshot
/// of the current contents, processes it, and then removes exactly that many
/// frames from the head, so frames that arrive in between are kept for the
/// next pass.
#[derive(Debug, Clone, Default)]
pub struct InboundQueue {
    frames: Arc<Mutex<VecDeque<String>>>,
}

impl InboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<String>> {
        self.frames.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, frame: String) {
        self.lock().push_back(frame);
    }

    /// Copies out the frames currently queued, oldest first.
    pub fn snapshot(&self) -> Vec<String> {
        self.lock().iter().cloned().collect()
    }

    /// Drops `count` frames from the head. Never removes more than is queued.
    pub fn remove_processed(&self, count: usize) {
        let mut frames = self.lock();
        let count = count.min(frames.len());
        frames.drain(..count);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_push_preserves_order() {
        let queue = InboundQueue::new();
        queue.push("a".into());
        queue.push("b".into());
        queue.push("c".into());

        assert_eq!(queue.snapshot(), vec!["a", "b", "c"]);
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_remove_processed_keeps_late_arrivals() {
        let queue = InboundQueue::new();
        queue.push("first".into());
        queue.push("second".into());

        let batch = queue.snapshot();
        queue.push("late-1".into());
        queue.push("late-2".into());
        queue.remove_processed(batch.len());

        assert_eq!(queue.snapshot(), vec!["late-1", "late-2"]);
    }

    #[test]
    fn test_remove_more_than_queued() {
        let queue = InboundQueue::new();
        queue.push("only".into());
        queue.remove_processed(5);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_concurrent_producers_lose_nothing() {
        let queue = InboundQueue::new();
        let producers: Vec<_> = (0..4)
            .map(|p| {
                let queue = queue.clone();
                thread::spawn(move || {
                    for i in 0..250 {
                        queue.push(format!("{}-{}", p, i));
                    }
                })
            })
            .collect();

        let mut consumed = Vec::new();
        while consumed.len() < 1000 {
            let batch = queue.snapshot();
            queue.remove_processed(batch.len());
            consumed.extend(batch);
            thread::yield_now();
        }

        for producer in producers {
            producer.join().unwrap();
        }

        assert_eq!(consumed.len(), 1000);
        assert!(queue.is_empty());

        // Per-producer order survives interleaving
        for p in 0..4 {
            let prefix = format!("{}-", p);
            let seen: Vec<usize> = consumed
                .iter()
                .filter_map(|f| f.strip_prefix(&prefix))
                .map(|i| i.parse().unwrap())
                .collect();
            assert_eq!(seen, (0..250).collect::<Vec<_>>());
        }
    }
}
