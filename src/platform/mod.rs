//! Capture-device boundary
//!
//! The acquisition loop talks to hardware only through [`DeviceBackend`] and
//! [`CaptureDevice`]. The `nokhwa` implementation lives in [`camera`].
pub mod camera;

use crate::errors::DeviceError;
use crate::types::{Frame, Resolution};

pub use camera::{list_devices, DeviceInfo, NokhwaBackend};

/// An opened capture device. Used only from the thread that opened it.
pub trait CaptureDevice {
    /// Read one frame. May block up to one frame interval.
    /// Errors are treated as transient by the caller.
    fn read_frame(&mut self) -> Result<Frame, DeviceError>;

    /// Stop streaming and release the hardware handle
    fn release(&mut self) {}
}

/// Opens capture devices by index
pub trait DeviceBackend: Send + Sync + 'static {
    fn open(&self, index: u32, resolution: Resolution) -> Result<Box<dyn CaptureDevice>, DeviceError>;
}
