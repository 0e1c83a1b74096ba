// THEORY:
// Stateless image operators used by the preprocessor. Each takes an immutable input
// and returns a freshly allocated output of the same dimensions.
//
// - `gaussian_blur`: separable smoothing with reflect-101 borders. Kernel sizes 3, 5
//   and 7 use the classic fixed binomial-like taps; larger sizes derive sigma from the
//   kernel size as `0.3 * ((k - 1) * 0.5 - 1) + 0.8`.
// - `threshold`: binarization with selectable polarity.
// - `close`: morphological closing (dilate then erode) with a square structuring
//   element. Pixels outside the image never contribute, so closing neither grows
//   blobs into the border nor erodes them away from it.

use crate::core_modules::frame::{Frame, Mask};
use crate::core_modules::params::normalize_kernel_size;
use serde::Deserialize;

/// Which side of the threshold counts as foreground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    /// Samples strictly above the level are foreground.
    Normal,
    /// Samples at or below the level are foreground (dark objects on a bright scene).
    Inverted,
}

/// 1-D Gaussian taps for an odd kernel size, summing to one.
pub fn gaussian_kernel(size: u32) -> Vec<f32> {
    match size {
        1 => vec![1.0],
        3 => vec![0.25, 0.5, 0.25],
        5 => vec![0.0625, 0.25, 0.375, 0.25, 0.0625],
        7 => vec![0.03125, 0.109375, 0.21875, 0.28125, 0.21875, 0.109375, 0.03125],
        _ => {
            let sigma = 0.3 * ((size as f64 - 1.0) * 0.5 - 1.0) + 0.8;
            let half = (size / 2) as f64;
            let scale = -0.5 / (sigma * sigma);
            let raw: Vec<f64> = (0..size)
                .map(|i| {
                    let x = i as f64 - half;
                    (scale * x * x).exp()
                })
                .collect();
            let sum: f64 = raw.iter().sum();
            raw.into_iter().map(|v| (v / sum) as f32).collect()
        }
    }
}

/// Mirrors an out-of-range index back into `0..len` without repeating the edge
/// sample (`dcb|abcd|cba`).
#[inline]
fn reflect_101(index: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let len = len as isize;
    let period = 2 * (len - 1);
    let mut i = index.rem_euclid(period);
    if i >= len {
        i = period - i;
    }
    i as usize
}

/// Smooths `frame` with a `size x size` Gaussian. The size is normalized first.
pub fn gaussian_blur(frame: &Frame, size: u32) -> Frame {
    let size = normalize_kernel_size(size);
    let (width, height) = (frame.width() as usize, frame.height() as usize);
    if width == 0 || height == 0 {
        return frame.clone();
    }
    let taps = gaussian_kernel(size);
    let half = (size / 2) as isize;
    let src = frame.as_slice();

    // Horizontal pass into a float buffer.
    let mut horizontal = vec![0.0f32; width * height];
    for y in 0..height {
        let row = &src[y * width..(y + 1) * width];
        for x in 0..width {
            let mut acc = 0.0f32;
            for (k, &tap) in taps.iter().enumerate() {
                let sx = reflect_101(x as isize + k as isize - half, width);
                acc += tap * row[sx] as f32;
            }
            horizontal[y * width + x] = acc;
        }
    }

    // Vertical pass back to 8-bit.
    let mut out = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0f32;
            for (k, &tap) in taps.iter().enumerate() {
                let sy = reflect_101(y as isize + k as isize - half, height);
                acc += tap * horizontal[sy * width + x];
            }
            out.push(acc.round().clamp(0.0, 255.0) as u8);
        }
    }

    Frame::from_raw(frame.width(), frame.height(), out)
        .unwrap_or_else(|| frame.clone())
}

/// Binarizes `frame` against `level`.
pub fn threshold(frame: &Frame, level: u8, polarity: Polarity) -> Mask {
    Mask::from_fn(frame.width(), frame.height(), |x, y| {
        let above = frame.get(x, y) > level;
        match polarity {
            Polarity::Normal => above,
            Polarity::Inverted => !above,
        }
    })
}

/// Morphological closing with a `size x size` square structuring element.
pub fn close(mask: &Mask, size: u32) -> Mask {
    if size <= 1 {
        return mask.clone();
    }
    let radius = (size / 2) as usize;
    let dilated = morph(mask, radius, Morph::Dilate);
    morph(&dilated, radius, Morph::Erode)
}

#[derive(Clone, Copy)]
enum Morph {
    Dilate,
    Erode,
}

/// One separable pass of binary dilation or erosion. The window is clipped to the
/// image, which is equivalent to padding with the operation's neutral value.
fn morph(mask: &Mask, radius: usize, op: Morph) -> Mask {
    let (width, height) = (mask.width() as usize, mask.height() as usize);
    if width == 0 || height == 0 {
        return mask.clone();
    }
    let src: Vec<bool> = mask.as_frame().as_slice().iter().map(|&v| v != 0).collect();

    let rows = sweep(&src, width, height, radius, op, Axis::Row);
    let both = sweep(&rows, width, height, radius, op, Axis::Column);

    Mask::from_fn(mask.width(), mask.height(), |x, y| both[y as usize * width + x as usize])
}

#[derive(Clone, Copy)]
enum Axis {
    Row,
    Column,
}

fn sweep(src: &[bool], width: usize, height: usize, radius: usize, op: Morph, axis: Axis) -> Vec<bool> {
    let (lines, len) = match axis {
        Axis::Row => (height, width),
        Axis::Column => (width, height),
    };
    let index = |line: usize, pos: usize| match axis {
        Axis::Row => line * width + pos,
        Axis::Column => pos * width + line,
    };

    let mut out = vec![false; width * height];
    let mut prefix = vec![0usize; len + 1];
    for line in 0..lines {
        for pos in 0..len {
            prefix[pos + 1] = prefix[pos] + src[index(line, pos)] as usize;
        }
        for pos in 0..len {
            let lo = pos.saturating_sub(radius);
            let hi = (pos + radius + 1).min(len);
            let set = prefix[hi] - prefix[lo];
            out[index(line, pos)] = match op {
                Morph::Dilate => set > 0,
                Morph::Erode => set == hi - lo,
            };
        }
    }
    out
}
