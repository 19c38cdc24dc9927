/// A decoded camera frame: contiguous RGB24 bytes in row-major order.
///
/// Pixel format conversion happens in the camera backend; everything
/// downstream treats the buffer as opaque until it is encoded for upload.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    sequence: u64,
}

pub const FRAME_CHANNELS: usize = 3;

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, sequence: u64) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * FRAME_CHANNELS,
            "data length must equal width * height * 3"
        );
        Self {
            data,
            width,
            height,
            sequence,
        }
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

    /// Monotonic counter assigned by the stream that produced the frame.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// RGBA copy of the pixels, the layout GUI image handles expect.
    pub fn to_rgba(&self) -> Vec<u8> {
        let mut rgba = Vec::with_capacity(self.data.len() / FRAME_CHANNELS * 4);
        for px in self.data.chunks_exact(FRAME_CHANNELS) {
            rgba.extend_from_slice(&[px[0], px[1], px[2], 255]);
        }
        rgba
    }
}
