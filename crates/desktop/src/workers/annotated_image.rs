use std::fs;
use std::io::{self, Write};
use std::path::Path;

use iced::widget::image::Handle;
use tempfile::NamedTempFile;

/// Server-annotated image kept in a temporary file for display and saving.
///
/// The file is removed when the value is dropped, so replacing or clearing
/// a result cleans up after itself.
pub struct AnnotatedImage {
    file: NamedTempFile,
    extension: &'static str,
    handle: Handle,
}

impl AnnotatedImage {
    pub fn from_bytes(bytes: &[u8]) -> io::Result<Self> {
        let extension = image::guess_format(bytes)
            .ok()
            .and_then(|f| f.extensions_str().first().copied())
            .unwrap_or("png");

        let mut file = tempfile::Builder::new()
            .prefix("facecam-annotated-")
            .suffix(&format!(".{extension}"))
            .tempfile()?;
        file.write_all(bytes)?;
        file.flush()?;

        let handle = Handle::from_path(file.path());
        Ok(Self {
            file,
            extension,
            handle,
        })
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// File extension matching the image format the server returned.
    pub fn extension(&self) -> &'static str {
        self.extension
    }

    pub fn save_as(&self, destination: &Path) -> io::Result<()> {
        fs::copy(self.file.path(), destination)?;
        log::info!("Annotated image saved to {}", destination.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png_bytes() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(4, 4, image::Rgb([0, 255, 0]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_writes_temp_file_with_detected_extension() {
        let bytes = png_bytes();
        let annotated = AnnotatedImage::from_bytes(&bytes).unwrap();
        assert_eq!(annotated.extension(), "png");
        assert_eq!(fs::read(annotated.path()).unwrap(), bytes);
    }

    #[test]
    fn test_save_as_copies_and_drop_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("result.png");
        let annotated = AnnotatedImage::from_bytes(&png_bytes()).unwrap();
        let temp_path = annotated.path().to_path_buf();

        annotated.save_as(&destination).unwrap();
        assert!(destination.exists());

        drop(annotated);
        assert!(!temp_path.exists());
        assert!(destination.exists());
    }
}
