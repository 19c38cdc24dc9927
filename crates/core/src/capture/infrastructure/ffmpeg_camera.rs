use std::path::PathBuf;
use std::time::Duration;

use crate::capture::domain::camera_backend::{
    CameraBackend, CameraDevice, CaptureConstraints, FacingMode, FrameSource,
};
use crate::capture::domain::capture_error::CaptureError;
use crate::shared::frame::Frame;

const EPERM: i32 = 1;
const ENOENT: i32 = 2;
const EAGAIN: i32 = 11;
const EACCES: i32 = 13;
const EBUSY: i32 = 16;
const ENODEV: i32 = 19;

#[cfg(target_os = "linux")]
const INPUT_FORMAT: &str = "v4l2";
#[cfg(target_os = "macos")]
const INPUT_FORMAT: &str = "avfoundation";
#[cfg(target_os = "windows")]
const INPUT_FORMAT: &str = "dshow";
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
const INPUT_FORMAT: &str = "";

#[cfg(target_os = "linux")]
const DEFAULT_DEVICE: &str = "/dev/video0";
#[cfg(target_os = "macos")]
const DEFAULT_DEVICE: &str = "0";
#[cfg(not(any(target_os = "linux", target_os = "macos")))]
const DEFAULT_DEVICE: &str = "video=Integrated Camera";

/// Webcam access through libavdevice (v4l2, AVFoundation or DirectShow).
pub struct FfmpegCamera;

impl FfmpegCamera {
    pub fn new() -> Self {
        Self
    }

    fn input_format() -> Option<ffmpeg_next::format::Format> {
        if INPUT_FORMAT.is_empty() || ffmpeg_next::init().is_err() {
            return None;
        }
        ffmpeg_next::device::input::video()
            .find(|f| f.name().split(',').any(|n| n == INPUT_FORMAT))
    }
}

impl Default for FfmpegCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraBackend for FfmpegCamera {
    fn is_supported(&self) -> bool {
        Self::input_format().is_some()
    }

    fn list_devices(&self) -> Result<Vec<CameraDevice>, CaptureError> {
        #[cfg(target_os = "linux")]
        {
            let entries =
                std::fs::read_dir("/dev").map_err(|e| CaptureError::Device(e.to_string()))?;
            let mut devices: Vec<CameraDevice> = entries
                .filter_map(|e| e.ok())
                .filter_map(|e| {
                    let name = e.file_name().to_string_lossy().to_string();
                    name.starts_with("video").then(|| CameraDevice {
                        id: format!("/dev/{name}"),
                        name,
                    })
                })
                .collect();
            devices.sort_by(|a, b| a.id.cmp(&b.id));
            Ok(devices)
        }
        #[cfg(not(target_os = "linux"))]
        {
            Ok(vec![CameraDevice {
                id: DEFAULT_DEVICE.to_string(),
                name: "Default camera".to_string(),
            }])
        }
    }

    fn open(&self, constraints: &CaptureConstraints) -> Result<Box<dyn FrameSource>, CaptureError> {
        let format = Self::input_format().ok_or(CaptureError::Unsupported)?;
        let device = constraints.device.as_deref().unwrap_or(DEFAULT_DEVICE);

        if constraints.facing_mode == FacingMode::Environment {
            log::debug!("Facing mode hint ignored by {INPUT_FORMAT}; opening {device}");
        }

        let mut options = ffmpeg_next::Dictionary::new();
        options.set(
            "video_size",
            &format!("{}x{}", constraints.ideal_width, constraints.ideal_height),
        );
        options.set("framerate", &constraints.frame_rate.to_string());

        let ctx = ffmpeg_next::format::open_with(&PathBuf::from(device), &format, options)
            .map_err(|e| classify_open_error(device, e))?;
        let ictx = match ctx {
            ffmpeg_next::format::context::Context::Input(ictx) => ictx,
            ffmpeg_next::format::context::Context::Output(_) => {
                return Err(CaptureError::Device(format!("{device} is not an input device")))
            }
        };

        let source = FfmpegCameraSource::new(ictx)?;
        let (width, height) = source.resolution();
        if width < constraints.min_width || height < constraints.min_height {
            return Err(CaptureError::Device(format!(
                "{device} delivers {width}x{height}, below the {}x{} minimum",
                constraints.min_width, constraints.min_height
            )));
        }
        Ok(Box::new(source))
    }
}

fn classify_open_error(device: &str, e: ffmpeg_next::Error) -> CaptureError {
    match e {
        ffmpeg_next::Error::Other { errno } if errno == EACCES || errno == EPERM => {
            CaptureError::Permission(format!("{device}: {e}"))
        }
        ffmpeg_next::Error::Other { errno } if errno == ENOENT || errno == ENODEV => {
            CaptureError::Device(format!("{device} not found"))
        }
        ffmpeg_next::Error::Other { errno } if errno == EBUSY => {
            CaptureError::Device(format!("{device} is in use by another application"))
        }
        other => CaptureError::Device(format!("{device}: {other}")),
    }
}

/// Decodes camera packets to RGB24 frames.
struct FfmpegCameraSource {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    stream_index: usize,
    width: u32,
    height: u32,
    sequence: u64,
}

// Safety: the source is moved into the pump thread and only used there.
unsafe impl Send for FfmpegCameraSource {}

impl FfmpegCameraSource {
    fn new(ictx: ffmpeg_next::format::context::Input) -> Result<Self, CaptureError> {
        let device_err = |e: ffmpeg_next::Error| CaptureError::Device(e.to_string());

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| CaptureError::Device("device exposes no video stream".into()))?;
        let stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
            .map_err(device_err)?;
        let decoder = codec_ctx.decoder().video().map_err(device_err)?;

        let width = decoder.width();
        let height = decoder.height();
        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .map_err(device_err)?;

        Ok(Self {
            ictx,
            decoder,
            scaler,
            stream_index,
            width,
            height,
            sequence: 0,
        })
    }

    fn try_receive(&mut self) -> Result<Option<Frame>, CaptureError> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }
        let mut rgb = ffmpeg_next::util::frame::video::Video::empty();
        self.scaler
            .run(&decoded, &mut rgb)
            .map_err(|e| CaptureError::Device(e.to_string()))?;

        let pixels = extract_rgb_pixels(&rgb, self.width, self.height);
        self.sequence += 1;
        Ok(Some(Frame::new(pixels, self.width, self.height, self.sequence)))
    }
}

impl FrameSource for FfmpegCameraSource {
    fn next_frame(&mut self) -> Result<Frame, CaptureError> {
        loop {
            if let Some(frame) = self.try_receive()? {
                return Ok(frame);
            }

            let mut packet = ffmpeg_next::Packet::empty();
            match packet.read(&mut self.ictx) {
                Ok(()) => {}
                Err(ffmpeg_next::Error::Other { errno }) if errno == EAGAIN => {
                    std::thread::sleep(Duration::from_millis(2));
                    continue;
                }
                Err(ffmpeg_next::Error::Eof) => {
                    return Err(CaptureError::Device("camera stream ended".into()))
                }
                Err(e) => return Err(CaptureError::Device(e.to_string())),
            }

            if packet.stream() != self.stream_index {
                continue;
            }
            if let Err(e) = self.decoder.send_packet(&packet) {
                log::trace!("Dropping undecodable camera packet: {e}");
            }
        }
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let w = width as usize;
    let h = height as usize;

    let mut pixels = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + w * 3]);
    }
    pixels
}
