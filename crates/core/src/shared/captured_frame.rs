use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, ImageReader};
use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum ImageLoadError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} is not a recognised image format")]
    UnknownFormat { path: PathBuf },
    #[error("{path} is not a supported image: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// An encoded still image ready for upload, plus the pixel size of its source.
///
/// Produced either by capturing a camera frame or by loading a file picked in
/// upload mode. Never mutated after construction.
#[derive(Clone, Debug, PartialEq)]
pub struct CapturedFrame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    mime_type: &'static str,
    file_name: String,
}

impl CapturedFrame {
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        mime_type: &'static str,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            data,
            width,
            height,
            mime_type,
            file_name: file_name.into(),
        }
    }

    /// Encodes a raw RGB frame as JPEG at its native size.
    pub fn encode_jpeg(
        frame: &Frame,
        quality: u8,
        file_name: impl Into<String>,
    ) -> Result<Self, image::ImageError> {
        let mut buf = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
        encoder.encode(
            frame.data(),
            frame.width(),
            frame.height(),
            image::ExtendedColorType::Rgb8,
        )?;
        Ok(Self::new(
            buf,
            frame.width(),
            frame.height(),
            ImageFormat::Jpeg.to_mime_type(),
            file_name,
        ))
    }

    /// Loads an image file as-is, sniffing its format for the upload MIME type.
    pub fn from_path(path: &Path) -> Result<Self, ImageLoadError> {
        let data = std::fs::read(path).map_err(|e| ImageLoadError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let decode_err = |e| ImageLoadError::Decode {
            path: path.to_path_buf(),
            source: e,
        };

        let reader = ImageReader::new(Cursor::new(&data))
            .with_guessed_format()
            .map_err(|e| ImageLoadError::Read {
                path: path.to_path_buf(),
                source: e,
            })?;
        let format = reader
            .format()
            .ok_or_else(|| ImageLoadError::UnknownFormat {
                path: path.to_path_buf(),
            })?;
        let (width, height) = reader.into_dimensions().map_err(decode_err)?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload".to_string());

        Ok(Self::new(
            data,
            width,
            height,
            format.to_mime_type(),
            file_name,
        ))
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn mime_type(&self) -> &'static str {
        self.mime_type
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn gradient_frame(width: u32, height: u32) -> Frame {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[(x * 4) as u8, (y * 4) as u8, 128]);
            }
        }
        Frame::new(data, width, height, 0)
    }

    #[test]
    fn test_encode_jpeg_produces_decodable_image_at_native_size() {
        let frame = gradient_frame(64, 48);
        let captured = CapturedFrame::encode_jpeg(&frame, 80, "frame.jpg").unwrap();

        assert_eq!(captured.mime_type(), "image/jpeg");
        assert_eq!(captured.file_name(), "frame.jpg");
        assert_eq!((captured.width(), captured.height()), (64, 48));

        let decoded = image::load_from_memory(captured.data()).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
    }

    #[test]
    fn test_lower_quality_yields_smaller_buffer() {
        let frame = gradient_frame(64, 64);
        let high = CapturedFrame::encode_jpeg(&frame, 95, "a.jpg").unwrap();
        let low = CapturedFrame::encode_jpeg(&frame, 10, "b.jpg").unwrap();
        assert!(low.data().len() < high.data().len());
    }

    #[test]
    fn test_from_path_reads_png_dimensions_and_mime() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("face.png");
        image::RgbImage::new(30, 20).save(&path).unwrap();

        let captured = CapturedFrame::from_path(&path).unwrap();
        assert_eq!((captured.width(), captured.height()), (30, 20));
        assert_eq!(captured.mime_type(), "image/png");
        assert_eq!(captured.file_name(), "face.png");
    }

    #[test]
    fn test_from_path_missing_file_is_read_error() {
        let tmp = TempDir::new().unwrap();
        let err = CapturedFrame::from_path(&tmp.path().join("missing.jpg")).unwrap_err();
        assert!(matches!(err, ImageLoadError::Read { .. }));
    }

    #[test]
    fn test_from_path_rejects_non_image() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("notes.txt");
        std::fs::write(&path, b"definitely not pixels").unwrap();
        let err = CapturedFrame::from_path(&path).unwrap_err();
        assert!(matches!(err, ImageLoadError::UnknownFormat { .. }));
    }
}
