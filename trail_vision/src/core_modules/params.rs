// THEORY:
// The tunable knobs of the pipeline (threshold level, blur kernels, blob area bounds,
// aspect-ratio cutoff) are written by an operator-facing control layer while the
// pipeline thread reads them once at the top of every frame.
//
// Two representations exist:
// 1.  `Parameters`: a plain `Copy` snapshot. Every stage receives a reference to one
//     snapshot per frame, so a stage never observes a value changing mid-frame.
// 2.  `SharedParameters`: the writable, thread-safe home of the values. Each field
//     lives in its own atomic, which makes every individual read and write tear-free.
//     There is no cross-field transaction: a snapshot may mix an old threshold with a
//     new blur size for one frame, which the pipeline tolerates.
//
// Out-of-range input is never rejected. It is clamped to the control range and
// kernel sizes are forced to odd values >= 3 by `normalize_kernel_size`, the single
// normalization routine used wherever a kernel size is consumed.

use std::sync::atomic::{AtomicU8, AtomicU32, AtomicU64, Ordering};

/// Smallest kernel size any smoothing stage accepts.
pub const MIN_KERNEL_SIZE: u32 = 3;
/// Upper end of the blur sliders.
pub const MAX_KERNEL_SLIDER: i64 = 15;
/// Upper end of the minimum-area slider.
pub const MAX_MIN_AREA_SLIDER: i64 = 500;
/// Upper end of the maximum-area slider.
pub const MAX_MAX_AREA_SLIDER: i64 = 40_000;
/// Upper end of the aspect-ratio slider, in hundredths.
pub const MAX_ASPECT_SLIDER: i64 = 120;

/// Sentinel bit pattern meaning "aspect-ratio filtering disabled".
const ASPECT_DISABLED: u64 = u64::MAX;

/// Forces a kernel size to be odd and at least 3.
///
/// An even value is bumped up by one first, then anything below 3 is raised to 3,
/// so `2 -> 3`, `14 -> 15` and any odd value >= 3 is returned unchanged. The
/// function is idempotent.
pub fn normalize_kernel_size(size: u32) -> u32 {
    let odd = if size % 2 == 0 { size + 1 } else { size };
    odd.max(MIN_KERNEL_SIZE)
}

/// Clamps a raw threshold slider value into `0..=255`.
pub fn threshold_from_slider(raw: i64) -> u8 {
    raw.clamp(0, 255) as u8
}

/// Clamps a raw blur slider value into `0..=15` and normalizes it.
pub fn kernel_from_slider(raw: i64) -> u32 {
    normalize_kernel_size(raw.clamp(0, MAX_KERNEL_SLIDER) as u32)
}

/// Clamps a raw minimum-area slider value into `0..=500`.
pub fn min_area_from_slider(raw: i64) -> f64 {
    raw.clamp(0, MAX_MIN_AREA_SLIDER) as f64
}

/// Clamps a raw maximum-area slider value into `0..=40000`.
pub fn max_area_from_slider(raw: i64) -> f64 {
    raw.clamp(0, MAX_MAX_AREA_SLIDER) as f64
}

/// Converts an aspect-ratio slider value (hundredths, `0..=120`) into a ratio.
pub fn aspect_cutoff_from_slider(raw: i64) -> f64 {
    raw.clamp(0, MAX_ASPECT_SLIDER) as f64 / 100.0
}

/// One frame's worth of pipeline parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Parameters {
    /// Binarization level applied to the smoothed frame or foreground mask.
    pub threshold_level: u8,
    /// Side of the square smoothing kernel applied to every incoming frame.
    pub blur_kernel_size: u32,
    /// Side of the square smoothing kernel applied to the foreground likelihood mask.
    pub foreground_mask_blur_kernel_size: u32,
    /// Blobs must have an area strictly greater than this.
    pub min_blob_area: f64,
    /// Blobs must have an area strictly less than this.
    pub max_blob_area: f64,
    /// When set, blobs must have a width/height ratio strictly below this.
    pub aspect_ratio_cutoff: Option<f64>,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            threshold_level: 132,
            blur_kernel_size: 7,
            foreground_mask_blur_kernel_size: 13,
            min_blob_area: 50.0,
            max_blob_area: 10_000.0,
            aspect_ratio_cutoff: None,
        }
    }
}

impl Parameters {
    /// Returns a copy with both kernel sizes normalized and the area bounds made
    /// non-negative. Applying it twice gives the same result as applying it once.
    pub fn normalized(self) -> Self {
        Self {
            blur_kernel_size: normalize_kernel_size(self.blur_kernel_size),
            foreground_mask_blur_kernel_size: normalize_kernel_size(self.foreground_mask_blur_kernel_size),
            min_blob_area: self.min_blob_area.max(0.0),
            max_blob_area: self.max_blob_area.max(0.0),
            aspect_ratio_cutoff: self.aspect_ratio_cutoff.map(|c| c.max(0.0)),
            ..self
        }
    }
}

/// Process-wide parameter store. Single writer per field, any number of readers.
#[derive(Debug)]
pub struct SharedParameters {
    threshold_level: AtomicU8,
    blur_kernel_size: AtomicU32,
    foreground_mask_blur_kernel_size: AtomicU32,
    min_blob_area: AtomicU64,
    max_blob_area: AtomicU64,
    aspect_ratio_cutoff: AtomicU64,
}

impl SharedParameters {
    pub fn new(initial: Parameters) -> Self {
        let initial = initial.normalized();
        Self {
            threshold_level: AtomicU8::new(initial.threshold_level),
            blur_kernel_size: AtomicU32::new(initial.blur_kernel_size),
            foreground_mask_blur_kernel_size: AtomicU32::new(initial.foreground_mask_blur_kernel_size),
            min_blob_area: AtomicU64::new(initial.min_blob_area.to_bits()),
            max_blob_area: AtomicU64::new(initial.max_blob_area.to_bits()),
            aspect_ratio_cutoff: AtomicU64::new(encode_cutoff(initial.aspect_ratio_cutoff)),
        }
    }

    /// Reads every field once. Fields are read independently.
    pub fn snapshot(&self) -> Parameters {
        Parameters {
            threshold_level: self.threshold_level.load(Ordering::Relaxed),
            blur_kernel_size: self.blur_kernel_size.load(Ordering::Relaxed),
            foreground_mask_blur_kernel_size: self.foreground_mask_blur_kernel_size.load(Ordering::Relaxed),
            min_blob_area: f64::from_bits(self.min_blob_area.load(Ordering::Relaxed)),
            max_blob_area: f64::from_bits(self.max_blob_area.load(Ordering::Relaxed)),
            aspect_ratio_cutoff: decode_cutoff(self.aspect_ratio_cutoff.load(Ordering::Relaxed)),
        }
    }

    pub fn set_threshold_level(&self, raw: i64) {
        self.threshold_level.store(threshold_from_slider(raw), Ordering::Relaxed);
    }

    pub fn set_blur_kernel_size(&self, raw: i64) {
        self.blur_kernel_size.store(kernel_from_slider(raw), Ordering::Relaxed);
    }

    pub fn set_foreground_mask_blur_kernel_size(&self, raw: i64) {
        self.foreground_mask_blur_kernel_size
            .store(kernel_from_slider(raw), Ordering::Relaxed);
    }

    pub fn set_min_blob_area(&self, raw: i64) {
        self.min_blob_area
            .store(min_area_from_slider(raw).to_bits(), Ordering::Relaxed);
    }

    pub fn set_max_blob_area(&self, raw: i64) {
        self.max_blob_area
            .store(max_area_from_slider(raw).to_bits(), Ordering::Relaxed);
    }

    /// `None` disables aspect-ratio filtering; `Some(hundredths)` enables it.
    pub fn set_aspect_ratio_cutoff(&self, raw: Option<i64>) {
        let cutoff = raw.map(aspect_cutoff_from_slider);
        self.aspect_ratio_cutoff
            .store(encode_cutoff(cutoff), Ordering::Relaxed);
    }
}

impl Default for SharedParameters {
    fn default() -> Self {
        Self::new(Parameters::default())
    }
}

fn encode_cutoff(cutoff: Option<f64>) -> u64 {
    match cutoff {
        Some(value) if value.is_finite() => value.to_bits(),
        _ => ASPECT_DISABLED,
    }
}

fn decode_cutoff(bits: u64) -> Option<f64> {
    (bits != ASPECT_DISABLED).then(|| f64::from_bits(bits))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn normalization_rounds_even_up_then_raises_to_three() {
        assert_eq!(normalize_kernel_size(0), 3);
        assert_eq!(normalize_kernel_size(1), 3);
        assert_eq!(normalize_kernel_size(2), 3);
        assert_eq!(normalize_kernel_size(14), 15);
        assert_eq!(normalize_kernel_size(8), 9);
    }

    #[test]
    fn normalization_is_idempotent() {
        for size in 0..64 {
            let once = normalize_kernel_size(size);
            assert_eq!(normalize_kernel_size(once), once);
            assert!(once % 2 == 1 && once >= 3);
        }
        for odd in [3, 5, 7, 9, 11, 13, 15] {
            assert_eq!(normalize_kernel_size(odd), odd);
        }
    }

    #[test]
    fn slider_writes_are_clamped_not_rejected() {
        let shared = SharedParameters::default();
        shared.set_threshold_level(400);
        shared.set_blur_kernel_size(-3);
        shared.set_foreground_mask_blur_kernel_size(99);
        shared.set_min_blob_area(-10);
        shared.set_max_blob_area(1_000_000);
        shared.set_aspect_ratio_cutoff(Some(500));

        let p = shared.snapshot();
        assert_eq!(p.threshold_level, 255);
        assert_eq!(p.blur_kernel_size, 3);
        assert_eq!(p.foreground_mask_blur_kernel_size, 15);
        assert_eq!(p.min_blob_area, 0.0);
        assert_eq!(p.max_blob_area, 40_000.0);
        assert_eq!(p.aspect_ratio_cutoff, Some(1.2));
    }

    #[test]
    fn aspect_filter_can_be_toggled() {
        let shared = SharedParameters::default();
        assert_eq!(shared.snapshot().aspect_ratio_cutoff, None);
        shared.set_aspect_ratio_cutoff(Some(80));
        assert_eq!(shared.snapshot().aspect_ratio_cutoff, Some(0.8));
        shared.set_aspect_ratio_cutoff(None);
        assert_eq!(shared.snapshot().aspect_ratio_cutoff, None);
    }

    #[test]
    fn initial_values_are_normalized() {
        let shared = SharedParameters::new(Parameters {
            blur_kernel_size: 4,
            foreground_mask_blur_kernel_size: 1,
            ..Parameters::default()
        });
        let p = shared.snapshot();
        assert_eq!(p.blur_kernel_size, 5);
        assert_eq!(p.foreground_mask_blur_kernel_size, 3);
    }

    #[test]
    fn writer_thread_updates_are_visible_to_reader() {
        let shared = Arc::new(SharedParameters::default());
        let writer = {
            let shared = Arc::clone(&shared);
            thread::spawn(move || {
                for level in 0..=255 {
                    shared.set_threshold_level(level);
                }
            })
        };
        writer.join().unwrap();
        assert_eq!(shared.snapshot().threshold_level, 255);
    }
}
