// THEORY:
// The `frame` module holds the two grid types every stage of the pipeline passes
// around: the grayscale `Frame` handed over by a frame source, and the binary
// `Mask` produced by the preprocessor.
//
// Key architectural principles:
// 1.  **Dumb Containers**: Neither type knows anything about blurring, contours or
//     tracking. They store row-major 8-bit samples and answer coordinate queries.
// 2.  **One Channel**: The engine assumes the source has already been demuxed and
//     converted to luma. Anything with colour is converted at the edge (see `source`).
// 3.  **Binary Invariant**: A `Mask` only ever holds 0 or 255. The only way to build
//     one is through a constructor that takes a predicate, so the invariant cannot
//     be broken by a stray write.

use image::GrayImage;

/// Value written to mask pixels that belong to the foreground.
pub const FOREGROUND: u8 = 255;
/// Value written to mask pixels that belong to the background.
pub const BACKGROUND: u8 = 0;

/// A single-channel 8-bit image stored row-major with no padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Frame {
    /// Wraps an existing buffer. Returns `None` when the buffer length does not
    /// match `width * height`.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if data.len() != width as usize * height as usize {
            return None;
        }
        Some(Self { width, height, data })
    }

    /// A frame where every sample has the same intensity.
    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        Self {
            width,
            height,
            data: vec![value; width as usize * height as usize],
        }
    }

    /// Builds a frame by evaluating `f(x, y)` for every pixel.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> u8) -> Self {
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self { width, height, data }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.data[y as usize * self.width as usize + x as usize]
    }

    #[inline]
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.width as usize;
        &self.data[start..start + self.width as usize]
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    pub fn to_gray_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| image::Luma([self.get(x, y)]))
    }
}

impl From<GrayImage> for Frame {
    fn from(image: GrayImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            data: image.into_raw(),
        }
    }
}

/// A binary foreground/background grid with the same dimensions as the frame it
/// was derived from. Recomputed every frame; no history is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    inner: Frame,
}

impl Mask {
    /// Builds a mask from a per-pixel predicate (`true` = foreground).
    pub fn from_fn(width: u32, height: u32, mut is_foreground: impl FnMut(u32, u32) -> bool) -> Self {
        Self {
            inner: Frame::from_fn(width, height, |x, y| {
                if is_foreground(x, y) { FOREGROUND } else { BACKGROUND }
            }),
        }
    }

    /// A mask with no foreground pixels.
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            inner: Frame::filled(width, height, BACKGROUND),
        }
    }

    pub fn width(&self) -> u32 {
        self.inner.width
    }

    pub fn height(&self) -> u32 {
        self.inner.height
    }

    #[inline]
    pub fn is_foreground(&self, x: u32, y: u32) -> bool {
        self.inner.get(x, y) != BACKGROUND
    }

    /// Foreground test with everything outside the grid treated as background.
    #[inline]
    pub fn is_foreground_signed(&self, x: i32, y: i32) -> bool {
        x >= 0
            && y >= 0
            && (x as u32) < self.inner.width
            && (y as u32) < self.inner.height
            && self.is_foreground(x as u32, y as u32)
    }

    pub fn foreground_count(&self) -> usize {
        self.inner.data.iter().filter(|&&v| v != BACKGROUND).count()
    }

    /// The mask viewed as a grayscale frame (0/255 samples).
    pub fn as_frame(&self) -> &Frame {
        &self.inner
    }

    pub fn to_gray_image(&self) -> GrayImage {
        self.inner.to_gray_image()
    }
}
