//! Frame hand-off between the camera producer and the extractor
//!
//! The capture side owns a [`FrameHub`] and publishes every decoded image
//! into it. Consumers hold a [`FrameSource`]: they are woken when a newer
//! frame exists and take an immutable snapshot of the latest one. Frames
//! are never queued; a slow consumer skips to the newest frame.

use async_trait::async_trait;
use focuskit_core::{thread_safe_rw, ThreadSafeRw, VisionError};
use image::RgbImage;
use std::sync::Arc;
use tokio::sync::watch;

/// Immutable snapshot of one camera frame, RGB channel order
#[derive(Debug, Clone)]
pub struct Frame {
    image: Arc<RgbImage>,
    sequence: u64,
}

impl Frame {
    /// Wrap an image, rejecting empty dimensions
    pub fn new(image: RgbImage, sequence: u64) -> Result<Self, VisionError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(VisionError::EmptyFrame {
                width: image.width(),
                height: image.height(),
            });
        }
        Ok(Self {
            image: Arc::new(image),
            sequence,
        })
    }

    /// Pixel data
    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Monotonic capture counter assigned by the hub
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Something that announces new frames and hands out the latest one
#[async_trait]
pub trait FrameSource: Send {
    /// Wait until a frame newer than the last announced one exists.
    ///
    /// Returns `false` once the producer has gone away.
    async fn frame_ready(&mut self) -> bool;

    /// The latest frame, if any has been published
    fn snapshot(&self) -> Option<Frame>;
}

/// Latest-frame slot shared by the camera producer and its consumers
#[derive(Clone)]
pub struct FrameHub {
    latest: ThreadSafeRw<Option<Frame>>,
    notify: Arc<watch::Sender<u64>>,
}

impl FrameHub {
    /// Create an empty hub
    pub fn new() -> Self {
        let (notify, _) = watch::channel(0);
        Self {
            latest: thread_safe_rw(None),
            notify: Arc::new(notify),
        }
    }

    /// Store a new frame and wake every subscriber
    ///
    /// Returns the sequence number assigned to the frame.
    pub fn publish(&self, image: RgbImage) -> Result<u64, VisionError> {
        let sequence = *self.notify.borrow() + 1;
        let frame = Frame::new(image, sequence)?;
        *self.latest.write() = Some(frame);
        self.notify.send_replace(sequence);
        Ok(sequence)
    }

    /// The latest frame
    pub fn snapshot(&self) -> Option<Frame> {
        self.latest.read().clone()
    }

    /// Subscribe to frame notifications
    ///
    /// Only frames published after this call are announced.
    pub fn subscribe(&self) -> FrameSubscription {
        let mut rx = self.notify.subscribe();
        rx.borrow_and_update();
        FrameSubscription {
            latest: self.latest.clone(),
            rx,
        }
    }
}

impl Default for FrameHub {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FrameHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameHub")
            .field("sequence", &*self.notify.borrow())
            .field("receivers", &self.notify.receiver_count())
            .finish()
    }
}

/// Consumer side of a [`FrameHub`]
pub struct FrameSubscription {
    latest: ThreadSafeRw<Option<Frame>>,
    rx: watch::Receiver<u64>,
}

#[async_trait]
impl FrameSource for FrameSubscription {
    async fn frame_ready(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    fn snapshot(&self) -> Option<Frame> {
        self.latest.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_frame_rejected() {
        let err = Frame::new(RgbImage::new(0, 4), 1).unwrap_err();
        assert_eq!(
            err,
            VisionError::EmptyFrame {
                width: 0,
                height: 4
            }
        );
    }

    #[test]
    fn test_publish_assigns_sequence() {
        let hub = FrameHub::new();
        assert!(hub.snapshot().is_none());

        assert_eq!(hub.publish(RgbImage::new(4, 4)).unwrap(), 1);
        assert_eq!(hub.publish(RgbImage::new(4, 4)).unwrap(), 2);
        assert_eq!(hub.snapshot().map(|f| f.sequence()), Some(2));

        // Empty frames leave the slot untouched
        assert!(hub.publish(RgbImage::new(0, 0)).is_err());
        assert_eq!(hub.snapshot().map(|f| f.sequence()), Some(2));
    }

    #[tokio::test]
    async fn test_subscription_wakes_on_publish() {
        let hub = FrameHub::new();
        hub.publish(RgbImage::new(2, 2)).unwrap();

        let mut sub = hub.subscribe();
        let producer = hub.clone();
        tokio::spawn(async move {
            producer.publish(RgbImage::new(3, 3)).unwrap();
        });

        assert!(sub.frame_ready().await);
        let frame = sub.snapshot().expect("frame");
        assert_eq!(frame.width(), 3);
    }

    #[tokio::test]
    async fn test_subscription_ends_with_producer() {
        let hub = FrameHub::new();
        let mut sub = hub.subscribe();
        drop(hub);
        assert!(!sub.frame_ready().await);
    }
}
