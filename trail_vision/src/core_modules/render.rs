// THEORY:
// The `render` module produces the three images a display layer shows for each
// frame. It does no analysis of its own: it only paints what the earlier stages
// already decided.
//
// 1.  **Segmented**: the grayscale frame blended 50/50 with every accepted blob's
//     boundary polygon filled in its own colour. Colours come from a fixed palette
//     indexed by discovery order, so the same scene always renders the same way.
// 2.  **Marked**: the grayscale frame with an orange outline around each accepted
//     blob, a red dot on the current centroid and green dots along the trail.
// 3.  **Mask**: the binary mask exactly as the blob extractor saw it.
//
// Drawing clips silently at the image border.

use crate::core_modules::blob::Blob;
use crate::core_modules::contour::Point;
use crate::core_modules::frame::{Frame, Mask};
use crate::error::Result;
use image::{GrayImage, Rgb, RgbImage};
use std::path::Path;

const OUTLINE: Rgb<u8> = Rgb([255, 165, 0]);
const CENTROID: Rgb<u8> = Rgb([255, 0, 0]);
const TAIL: Rgb<u8> = Rgb([0, 255, 0]);
const CENTROID_RADIUS: i32 = 3;
const TAIL_RADIUS: i32 = 2;

const PALETTE: [Rgb<u8>; 8] = [
    Rgb([230, 25, 75]),
    Rgb([60, 180, 75]),
    Rgb([255, 225, 25]),
    Rgb([0, 130, 200]),
    Rgb([245, 130, 48]),
    Rgb([145, 30, 180]),
    Rgb([70, 240, 240]),
    Rgb([240, 50, 230]),
];

/// The per-frame display images, all with the source frame's dimensions.
#[derive(Debug, Clone)]
pub struct RenderOutputs {
    pub segmented: RgbImage,
    pub marked: RgbImage,
    pub mask: GrayImage,
}

impl RenderOutputs {
    pub fn new(frame: &Frame, mask: &Mask, blobs: &[Blob], trail: &[(f64, f64)]) -> Self {
        Self {
            segmented: segmented(frame, blobs),
            marked: marked(frame, blobs, trail),
            mask: mask.to_gray_image(),
        }
    }

    /// Writes the three images as `<kind>_<index>.png` under `dir`.
    pub fn save(&self, dir: &Path, index: u64) -> Result<()> {
        self.segmented.save(dir.join(format!("segmented_{index:05}.png")))?;
        self.marked.save(dir.join(format!("marked_{index:05}.png")))?;
        self.mask.save(dir.join(format!("mask_{index:05}.png")))?;
        Ok(())
    }
}

fn gray_to_rgb(frame: &Frame) -> RgbImage {
    RgbImage::from_fn(frame.width(), frame.height(), |x, y| {
        let v = frame.get(x, y);
        Rgb([v, v, v])
    })
}

pub fn segmented(frame: &Frame, blobs: &[Blob]) -> RgbImage {
    let mut fill = RgbImage::new(frame.width(), frame.height());
    for (i, blob) in blobs.iter().enumerate() {
        fill_polygon(&mut fill, &blob.contour.points, PALETTE[i % PALETTE.len()]);
    }

    let mut out = gray_to_rgb(frame);
    for (dst, src) in out.pixels_mut().zip(fill.pixels()) {
        for c in 0..3 {
            dst.0[c] = ((dst.0[c] as u16 + src.0[c] as u16) / 2) as u8;
        }
    }
    out
}

pub fn marked(frame: &Frame, blobs: &[Blob], trail: &[(f64, f64)]) -> RgbImage {
    let mut out = gray_to_rgb(frame);
    for blob in blobs {
        draw_polyline(&mut out, &blob.contour.points, OUTLINE, 2);
    }
    for &(x, y) in trail {
        fill_disc(&mut out, x.round() as i32, y.round() as i32, TAIL_RADIUS, TAIL);
    }
    for blob in blobs {
        let (x, y) = blob.observation.centroid;
        fill_disc(&mut out, x.round() as i32, y.round() as i32, CENTROID_RADIUS, CENTROID);
    }
    out
}

fn put(img: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, color);
    }
}

fn fill_disc(img: &mut RgbImage, cx: i32, cy: i32, r: i32, color: Rgb<u8>) {
    for dy in -r..=r {
        for dx in -r..=r {
            if dx * dx + dy * dy <= r * r {
                put(img, cx + dx, cy + dy, color);
            }
        }
    }
}

/// Bresenham line, stamped with a `thickness`-sided square at every step.
fn draw_line(img: &mut RgbImage, a: Point, b: Point, color: Rgb<u8>, thickness: i32) {
    let (mut x, mut y) = (a.x, a.y);
    let (dx, dy) = ((b.x - a.x).abs(), -(b.y - a.y).abs());
    let (sx, sy) = (if a.x < b.x { 1 } else { -1 }, if a.y < b.y { 1 } else { -1 });
    let mut err = dx + dy;
    loop {
        for oy in 0..thickness {
            for ox in 0..thickness {
                put(img, x + ox, y + oy, color);
            }
        }
        if x == b.x && y == b.y {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

fn draw_polyline(img: &mut RgbImage, points: &[Point], color: Rgb<u8>, thickness: i32) {
    let n = points.len();
    for i in 0..n {
        draw_line(img, points[i], points[(i + 1) % n], color, thickness);
    }
}

/// Even-odd scanline fill of the closed polygon, boundary pixels included.
fn fill_polygon(img: &mut RgbImage, points: &[Point], color: Rgb<u8>) {
    let n = points.len();
    if n == 0 {
        return;
    }
    let y_min = points.iter().map(|p| p.y).min().unwrap_or(0);
    let y_max = points.iter().map(|p| p.y).max().unwrap_or(0);

    let mut crossings: Vec<f64> = Vec::new();
    for y in y_min..=y_max {
        crossings.clear();
        let scan = y as f64 + 0.5;
        for i in 0..n {
            let (a, b) = (points[i], points[(i + 1) % n]);
            let (ay, by) = (a.y as f64, b.y as f64);
            if (ay <= scan && scan < by) || (by <= scan && scan < ay) {
                let t = (scan - ay) / (by - ay);
                crossings.push(a.x as f64 + t * (b.x - a.x) as f64);
            }
        }
        crossings.sort_by(|l, r| l.total_cmp(r));
        for pair in crossings.chunks_exact(2) {
            let start = pair[0].ceil() as i32;
            let end = pair[1].floor() as i32;
            for x in start..=end {
                put(img, x, y, color);
            }
        }
    }
    draw_polyline(img, points, color, 1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::blob::BlobObservation;
    use crate::core_modules::contour::Contour;

    fn square_blob() -> Blob {
        let points = vec![
            Point::new(10, 10),
            Point::new(10, 19),
            Point::new(19, 19),
            Point::new(19, 10),
        ];
        Blob {
            contour: Contour { points },
            observation: BlobObservation {
                area: 81.0,
                aspect_ratio: None,
                centroid: (14.5, 14.5),
            },
        }
    }

    #[test]
    fn outputs_match_frame_dimensions() {
        let frame = Frame::filled(40, 30, 100);
        let mask = Mask::empty(40, 30);
        let out = RenderOutputs::new(&frame, &mask, &[square_blob()], &[(5.0, 5.0)]);
        assert_eq!(out.segmented.dimensions(), (40, 30));
        assert_eq!(out.marked.dimensions(), (40, 30));
        assert_eq!(out.mask.dimensions(), (40, 30));
    }

    #[test]
    fn segmented_blends_fill_inside_the_polygon_only() {
        let frame = Frame::filled(40, 40, 100);
        let img = segmented(&frame, &[square_blob()]);
        let [r, g, b] = PALETTE[0].0;
        let blended = Rgb([
            ((100 + r as u16) / 2) as u8,
            ((100 + g as u16) / 2) as u8,
            ((100 + b as u16) / 2) as u8,
        ]);
        assert_eq!(*img.get_pixel(14, 14), blended);
        assert_eq!(*img.get_pixel(10, 10), blended);
        assert_eq!(*img.get_pixel(30, 30), Rgb([50, 50, 50]));
    }

    #[test]
    fn marked_shows_outline_centroid_and_tail() {
        let frame = Frame::filled(40, 40, 0);
        let img = marked(&frame, &[square_blob()], &[(30.0, 30.0)]);
        assert_eq!(*img.get_pixel(10, 15), OUTLINE);
        assert_eq!(*img.get_pixel(15, 15), CENTROID);
        assert_eq!(*img.get_pixel(30, 30), TAIL);
        assert_eq!(*img.get_pixel(0, 39), Rgb([0, 0, 0]));
    }

    #[test]
    fn drawing_clips_at_the_border() {
        let frame = Frame::filled(8, 8, 0);
        let img = marked(&frame, &[], &[(0.0, 0.0), (7.0, 7.0), (-20.0, 50.0)]);
        assert_eq!(*img.get_pixel(0, 0), TAIL);
        assert_eq!(*img.get_pixel(7, 7), TAIL);
    }
}
