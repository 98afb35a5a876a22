use ndarray::ArrayView3;

/// A decoded RGB24 frame: tightly packed, row-major, three bytes per pixel.
///
/// `index` is the frame's position in decode order (0-based). Color
/// conversion happens at the I/O boundary, so everything downstream of
/// a reader can assume RGB.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    index: usize,
}

impl Frame {
    pub const CHANNELS: usize = 3;

    pub fn new(data: Vec<u8>, width: u32, height: u32, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * Self::CHANNELS,
            "data length must equal width * height * 3"
        );
        Self {
            data,
            width,
            height,
            index,
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

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(
            (self.height as usize, self.width as usize, Self::CHANNELS),
            &self.data,
        )
        .expect("Frame data length must match dimensions")
    }

    /// Copies the rectangle `[x1, x2) × [y1, y2)` into a new frame.
    ///
    /// The rectangle is clamped to the frame bounds; returns `None` if
    /// nothing is left after clamping.
    pub fn crop(&self, x1: u32, y1: u32, x2: u32, y2: u32) -> Option<Frame> {
        let x2 = x2.min(self.width);
        let y2 = y2.min(self.height);
        if x1 >= x2 || y1 >= y2 {
            return None;
        }

        let row_bytes = self.width as usize * Self::CHANNELS;
        let start = x1 as usize * Self::CHANNELS;
        let end = x2 as usize * Self::CHANNELS;
        let mut data = Vec::with_capacity((end - start) * (y2 - y1) as usize);
        for row in y1 as usize..y2 as usize {
            let offset = row * row_bytes;
            data.extend_from_slice(&self.data[offset + start..offset + end]);
        }

        Some(Frame::new(data, x2 - x1, y2 - y1, self.index))
    }
}
