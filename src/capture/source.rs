//! Background frame capture.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use ndarray::Array3;
use tracing::{debug, error, info, warn};

use super::frame::{Frame, Rotation};
use super::slot::{FrameSlot, SlotStats};
use crate::config::CaptureConfig;
use crate::error::{Error, Result};

/// Failure reported by a capture device.
pub type DeviceFailure = Box<dyn std::error::Error + Send + Sync>;

/// A camera or other image producer.
///
/// Implementations block in [`grab`](CaptureDevice::grab) for as long as the
/// device needs to deliver its next image.
pub trait CaptureDevice: Send + 'static {
    /// Read the next image (rows x columns x channels).
    ///
    /// `Ok(None)` means the device had nothing this time; the caller retries.
    fn grab(&mut self) -> std::result::Result<Option<Array3<u8>>, DeviceFailure>;

    /// Release the underlying hardware.
    fn release(&mut self) {}
}

/// Owns a capture device and keeps the latest frame available to readers.
pub struct FrameSource {
    slot: Arc<FrameSlot>,
    device: Option<Box<dyn CaptureDevice>>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<Box<dyn CaptureDevice>>>,
    rotation: Rotation,
    backoff: Duration,
}

impl FrameSource {
    /// Open the device through `opener`.
    ///
    /// An opener failure is returned as [`Error::DeviceUnavailable`].
    pub fn open<D, F>(config: &CaptureConfig, opener: F) -> Result<Self>
    where
        D: CaptureDevice,
        F: FnOnce(&CaptureConfig) -> std::result::Result<D, DeviceFailure>,
    {
        let rotation = Rotation::from_degrees(config.rotation_degrees).ok_or_else(|| {
            Error::InvalidConfig(format!(
                "unsupported rotation {} degrees",
                config.rotation_degrees
            ))
        })?;

        let device = opener(config).map_err(|e| {
            Error::DeviceUnavailable(format!("{}: {e}", config.device))
        })?;
        info!(
            "Opened capture device {} ({}x{})",
            config.device, config.width, config.height
        );

        Ok(Self {
            slot: Arc::new(FrameSlot::new()),
            device: Some(Box::new(device)),
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
            rotation,
            backoff: config.retry_backoff(),
        })
    }

    /// Start capturing on a background thread.
    pub fn start(&mut self) -> Result<()> {
        if self.handle.is_some() {
            return Ok(());
        }
        let device = self
            .device
            .take()
            .ok_or_else(|| Error::DeviceUnavailable("device already released".to_string()))?;

        self.running.store(true, Ordering::SeqCst);
        let slot = Arc::clone(&self.slot);
        let running = Arc::clone(&self.running);
        let rotation = self.rotation;
        let backoff = self.backoff;

        let handle = thread::Builder::new()
            .name("frame-capture".into())
            .spawn(move || capture_loop(device, slot, running, rotation, backoff))
            .map_err(|e| Error::DeviceUnavailable(format!("failed to spawn capture thread: {e}")))?;
        self.handle = Some(handle);
        Ok(())
    }

    /// The most recent frame without blocking, `None` until the first capture.
    pub fn latest(&self) -> Option<Arc<Frame>> {
        self.slot.latest()
    }

    /// Wait up to `timeout` for a frame newer than `after`.
    pub fn wait_newer(&self, after: u64, timeout: Duration) -> Option<Arc<Frame>> {
        self.slot.wait_newer(after, timeout)
    }

    /// Shared handle to the frame slot for readers on other threads.
    pub fn slot(&self) -> Arc<FrameSlot> {
        Arc::clone(&self.slot)
    }

    pub fn stats(&self) -> SlotStats {
        self.slot.stats()
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Stop capturing and release the device.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            match handle.join() {
                Ok(mut device) => device.release(),
                Err(_) => error!("Capture thread panicked; device not released cleanly"),
            }
        } else if let Some(mut device) = self.device.take() {
            device.release();
        }
        let stats = self.slot.stats();
        info!(
            "Capture stopped after {} frames ({} dropped)",
            stats.published, stats.dropped
        );
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        if self.handle.is_some() || self.device.is_some() {
            self.stop();
        }
    }
}

fn capture_loop(
    mut device: Box<dyn CaptureDevice>,
    slot: Arc<FrameSlot>,
    running: Arc<AtomicBool>,
    rotation: Rotation,
    backoff: Duration,
) -> Box<dyn CaptureDevice> {
    let mut sequence = 0u64;
    let mut failures = 0u64;

    while running.load(Ordering::Relaxed) {
        match device.grab() {
            Ok(Some(image)) => {
                if failures > 0 {
                    info!("Capture recovered after {failures} failed reads");
                    failures = 0;
                }
                let captured_at = Instant::now();
                sequence += 1;
                slot.publish(Frame::new(rotation.apply(image), captured_at, sequence));
            }
            Ok(None) => thread::sleep(backoff),
            Err(e) => {
                failures += 1;
                if failures == 1 {
                    warn!("Capture read failed: {e}");
                } else {
                    debug!("Capture read failed ({failures} in a row): {e}");
                }
                thread::sleep(backoff);
            }
        }
    }

    device
}
