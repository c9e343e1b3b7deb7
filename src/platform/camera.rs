use super::{CaptureDevice, DeviceBackend};
use crate::errors::DeviceError;
use crate::types::{Frame, PixelFormat, Resolution};
use nokhwa::{
    pixel_format::RgbFormat,
    query,
    utils::{ApiBackend, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType},
    Camera,
};
use serde::Serialize;

/// A camera visible to the native backend
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub index: String,
    pub name: String,
    pub description: String,
}

/// List cameras visible to the native backend
pub fn list_devices() -> Result<Vec<DeviceInfo>, DeviceError> {
    let cameras = query(ApiBackend::Auto)
        .map_err(|e| DeviceError::EnumerationFailed(e.to_string()))?;

    Ok(cameras
        .into_iter()
        .map(|info| DeviceInfo {
            index: info.index().to_string(),
            name: info.human_name(),
            description: info.description().to_string(),
        })
        .collect())
}

/// `nokhwa`-backed device opener, decoding every frame to RGB8
#[derive(Debug, Default, Clone, Copy)]
pub struct NokhwaBackend;

impl DeviceBackend for NokhwaBackend {
    fn open(&self, index: u32, resolution: Resolution) -> Result<Box<dyn CaptureDevice>, DeviceError> {
        log::info!(
            "Opening camera {} at {}x{}",
            index,
            resolution.width,
            resolution.height
        );

        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
            nokhwa::utils::CameraFormat::new(
                nokhwa::utils::Resolution::new(resolution.width, resolution.height),
                FrameFormat::MJPEG,
                30,
            ),
        ));

        let mut camera = Camera::new(CameraIndex::Index(index), requested)
            .map_err(|e| DeviceError::open_failed(index, e.to_string()))?;

        camera
            .open_stream()
            .map_err(|e| DeviceError::open_failed(index, format!("failed to start stream: {}", e)))?;

        let actual = camera.resolution();
        if actual.width_x != resolution.width || actual.height_y != resolution.height {
            log::info!(
                "Camera {} negotiated {}x{} instead of {}x{}",
                index,
                actual.width_x,
                actual.height_y,
                resolution.width,
                resolution.height
            );
        }

        Ok(Box::new(NokhwaDevice {
            camera,
            streaming: true,
        }))
    }
}

struct NokhwaDevice {
    camera: Camera,
    streaming: bool,
}

impl CaptureDevice for NokhwaDevice {
    fn read_frame(&mut self) -> Result<Frame, DeviceError> {
        let buffer = self
            .camera
            .frame()
            .map_err(|e| DeviceError::TransientReadFailure(e.to_string()))?;

        let width = buffer.resolution().width_x;
        let height = buffer.resolution().height_y;
        let raw = buffer.buffer_bytes();

        // Some drivers hand back MJPEG even when RGB was requested
        let rgb = if raw.len() >= 3 && raw[0] == 0xFF && raw[1] == 0xD8 && raw[2] == 0xFF {
            image::load_from_memory(&raw)
                .map_err(|e| DeviceError::TransientReadFailure(format!("MJPEG decode failed: {}", e)))?
                .to_rgb8()
                .into_raw()
        } else {
            buffer
                .decode_image::<RgbFormat>()
                .map_err(|e| DeviceError::TransientReadFailure(format!("decode failed: {}", e)))?
                .into_raw()
        };

        Ok(Frame::new(rgb, width, height, PixelFormat::Rgb8))
    }

    fn release(&mut self) {
        if self.streaming {
            if let Err(e) = self.camera.stop_stream() {
                log::warn!("Failed to stop camera stream: {}", e);
            }
            self.streaming = false;
        }
    }
}

impl Drop for NokhwaDevice {
    fn drop(&mut self) {
        self.release();
    }
}
