use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};

use crate::audio::AudioFrame;

/// A frame waiting for the encoder
#[derive(Debug, Clone)]
pub(crate) struct QueuedFrame {
    /// Arrival index within the session
    pub index: u64,
    /// Session offset of the frame
    pub offset: Duration,
    pub frame: AudioFrame,
}

/// Why no more frames will arrive
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CloseReason {
    /// Caller stop or end of input: drain and flush
    Finished,
    /// Stream ended or device lost: drain and flush, then report
    Interrupted(String),
}

/// Result of offering a frame to the queue
#[derive(Debug, PartialEq)]
pub(crate) enum Offer {
    Queued,
    /// Queue was full; the oldest frame was evicted. Carries the running total.
    DroppedOldest { total_dropped: u64 },
    /// Queue no longer accepts frames
    Closed,
}

/// What the encode worker gets next
#[derive(Debug)]
pub(crate) enum Next {
    Frame(QueuedFrame),
    /// Queue is empty and closed
    Closed(CloseReason),
    /// Abandon remaining work without flushing
    Cancelled,
}

struct Inner {
    frames: VecDeque<QueuedFrame>,
    closed: Option<CloseReason>,
    cancelled: bool,
    dropped: u64,
}

/// Bounded single-consumer frame queue with drop-oldest backpressure
pub(crate) struct FrameQueue {
    inner: Mutex<Inner>,
    notify: Notify,
    capacity: usize,
}

impl FrameQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Inner {
                frames: VecDeque::with_capacity(capacity),
                closed: None,
                cancelled: false,
                dropped: 0,
            }),
            notify: Notify::new(),
            capacity,
        }
    }

    pub async fn offer(&self, frame: QueuedFrame) -> Offer {
        let offer = {
            let mut inner = self.inner.lock().await;
            if inner.closed.is_some() || inner.cancelled {
                return Offer::Closed;
            }

            let offer = if inner.frames.len() >= self.capacity {
                inner.frames.pop_front();
                inner.dropped += 1;
                Offer::DroppedOldest {
                    total_dropped: inner.dropped,
                }
            } else {
                Offer::Queued
            };
            inner.frames.push_back(frame);
            offer
        };

        self.notify.notify_one();
        offer
    }

    /// Stop accepting frames. The first reason wins.
    pub async fn close(&self, reason: CloseReason) {
        {
            let mut inner = self.inner.lock().await;
            if inner.closed.is_none() {
                inner.closed = Some(reason);
            }
        }
        self.notify.notify_one();
    }

    /// Tell the consumer to stop after its current frame
    pub async fn cancel(&self) {
        self.inner.lock().await.cancelled = true;
        self.notify.notify_one();
    }

    #[cfg(test)]
    pub async fn is_cancelled(&self) -> bool {
        self.inner.lock().await.cancelled
    }

    #[cfg(test)]
    pub async fn dropped(&self) -> u64 {
        self.inner.lock().await.dropped
    }

    /// Wait for the next frame, the close signal, or cancellation
    pub async fn next(&self) -> Next {
        loop {
            {
                let mut inner = self.inner.lock().await;
                if inner.cancelled {
                    return Next::Cancelled;
                }
                if let Some(frame) = inner.frames.pop_front() {
                    return Next::Frame(frame);
                }
                if let Some(reason) = &inner.closed {
                    return Next::Closed(reason.clone());
                }
            }
            self.notify.notified().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queued(index: u64) -> QueuedFrame {
        QueuedFrame {
            index,
            offset: Duration::from_millis(index * 10),
            frame: AudioFrame {
                samples: vec![index as i16],
                sample_rate: 16000,
                channels: 1,
                timestamp_ms: index * 10,
            },
        }
    }

    async fn next_index(queue: &FrameQueue) -> Option<u64> {
        match queue.next().await {
            Next::Frame(f) => Some(f.index),
            _ => None,
        }
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = FrameQueue::new(4);
        for i in 0..3 {
            assert_eq!(queue.offer(queued(i)).await, Offer::Queued);
        }

        assert_eq!(next_index(&queue).await, Some(0));
        assert_eq!(next_index(&queue).await, Some(1));
        assert_eq!(next_index(&queue).await, Some(2));
    }

    #[tokio::test]
    async fn test_full_queue_drops_oldest() {
        let queue = FrameQueue::new(2);
        queue.offer(queued(0)).await;
        queue.offer(queued(1)).await;

        assert_eq!(
            queue.offer(queued(2)).await,
            Offer::DroppedOldest { total_dropped: 1 }
        );
        assert_eq!(
            queue.offer(queued(3)).await,
            Offer::DroppedOldest { total_dropped: 2 }
        );
        assert_eq!(queue.dropped().await, 2);

        assert_eq!(next_index(&queue).await, Some(2));
        assert_eq!(next_index(&queue).await, Some(3));
    }

    #[tokio::test]
    async fn test_close_drains_before_reporting() {
        let queue = FrameQueue::new(4);
        queue.offer(queued(0)).await;
        queue.close(CloseReason::Interrupted("unplugged".into())).await;
        queue.close(CloseReason::Finished).await;

        assert_eq!(queue.offer(queued(1)).await, Offer::Closed);
        assert_eq!(next_index(&queue).await, Some(0));
        match queue.next().await {
            Next::Closed(reason) => {
                assert_eq!(reason, CloseReason::Interrupted("unplugged".into()))
            }
            other => panic!("expected closed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancel_skips_remaining_frames() {
        let queue = FrameQueue::new(4);
        queue.offer(queued(0)).await;
        queue.cancel().await;

        assert!(queue.is_cancelled().await);
        assert!(matches!(queue.next().await, Next::Cancelled));
    }

    #[tokio::test]
    async fn test_consumer_wakes_on_offer() {
        let queue = std::sync::Arc::new(FrameQueue::new(4));
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { next_index(&queue).await })
        };

        tokio::task::yield_now().await;
        queue.offer(queued(7)).await;

        assert_eq!(consumer.await.unwrap(), Some(7));
    }
}
