// THEORY:
// The `BackgroundModel` is the stateful, learning half of the preprocessor. Where the
// static threshold mode assumes a fixed scene, this model learns what "normal" looks
// like for every pixel individually and reports how unlikely the current sample is.
//
// Key architectural principles:
// 1.  **Per-Pixel Memory**: Each pixel owns a small mixture of Gaussian modes
//     (weight, mean, variance). Modes are kept sorted by weight so the heaviest,
//     most persistent explanation of the pixel is examined first.
// 2.  **Adaptive Learning Rate**: Early frames learn fast and the rate settles to
//     `1 / history`: `alpha = 1 / min(2 * frames_seen, history)`.
// 3.  **Background Decision**: A sample is background when it lies within
//     `var_threshold` squared deviations of one of the modes that together make up
//     the first `background_ratio` of the total weight.
// 4.  **Mode Lifecycle**: A sample that fits no mode spawns a new one (replacing the
//     weakest if the mixture is full). Modes whose weight decays below the
//     complexity-reduction prune are dropped.
// 5.  **Shadows**: A foreground sample that is a uniformly darkened copy of a
//     background mode (ratio in `[shadow_threshold, 1]`) is labelled with
//     `shadow_value` instead of full foreground, so a threshold above that value
//     discards it.
//
// The output of `apply` is a likelihood mask: 0 (background), `shadow_value`
// (shadow) or 255 (foreground).

use crate::core_modules::frame::{BACKGROUND, FOREGROUND, Frame};
use serde::Deserialize;

/// Tuning of the mixture-of-Gaussians model.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BackgroundConfig {
    /// Number of frames that define the steady-state learning rate.
    pub history: u32,
    /// Squared Mahalanobis distance under which a sample is background.
    pub var_threshold: f32,
    /// Squared Mahalanobis distance under which a sample updates an existing mode.
    pub var_threshold_gen: f32,
    /// Maximum number of modes per pixel.
    pub max_modes: usize,
    /// Fraction of total weight that counts as background.
    pub background_ratio: f32,
    /// Variance given to a freshly spawned mode.
    pub var_init: f32,
    pub var_min: f32,
    pub var_max: f32,
    /// Complexity-reduction prior; drives pruning of weak modes.
    pub complexity_reduction: f32,
    pub detect_shadows: bool,
    /// Mask value written for shadow pixels.
    pub shadow_value: u8,
    /// Darkest ratio of sample to mode mean still considered a shadow.
    pub shadow_threshold: f32,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            history: 500,
            var_threshold: 16.0,
            var_threshold_gen: 9.0,
            max_modes: 5,
            background_ratio: 0.9,
            var_init: 15.0,
            var_min: 4.0,
            var_max: 75.0,
            complexity_reduction: 0.05,
            detect_shadows: true,
            shadow_value: 127,
            shadow_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Mode {
    weight: f32,
    mean: f32,
    variance: f32,
}

/// Per-pixel mixture-of-Gaussians background model for a fixed frame size.
pub struct BackgroundModel {
    width: u32,
    height: u32,
    config: BackgroundConfig,
    /// `max_modes` slots per pixel, heaviest first.
    modes: Vec<Mode>,
    /// How many leading slots of each pixel are in use.
    modes_used: Vec<u8>,
    frames_seen: u64,
}

impl BackgroundModel {
    pub fn new(width: u32, height: u32, config: BackgroundConfig) -> Self {
        let config = BackgroundConfig {
            max_modes: config.max_modes.clamp(1, u8::MAX as usize),
            history: config.history.max(1),
            ..config
        };
        let pixels = width as usize * height as usize;
        Self {
            width,
            height,
            modes: vec![Mode::default(); pixels * config.max_modes],
            modes_used: vec![0; pixels],
            config,
            frames_seen: 0,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    /// The learning rate that the next call to `apply` will use.
    pub fn learning_rate(&self) -> f32 {
        let n = (self.frames_seen + 1).saturating_mul(2);
        1.0 / n.min(self.config.history as u64) as f32
    }

    /// Folds `frame` into the model and returns the foreground likelihood mask.
    /// `frame` must have the dimensions the model was built for.
    pub fn apply(&mut self, frame: &Frame) -> Frame {
        let alpha = self.learning_rate();
        self.frames_seen += 1;

        let k = self.config.max_modes;
        let samples = frame.as_slice();
        let mut out = Vec::with_capacity(samples.len());
        for (pixel, &sample) in samples.iter().enumerate() {
            let slots = &mut self.modes[pixel * k..(pixel + 1) * k];
            let used = &mut self.modes_used[pixel];
            out.push(update_pixel(slots, used, sample as f32, alpha, &self.config));
        }

        Frame::from_raw(self.width, self.height, out)
            .unwrap_or_else(|| Frame::filled(self.width, self.height, FOREGROUND))
    }
}

/// Updates one pixel's mixture and classifies the sample.
fn update_pixel(slots: &mut [Mode], used: &mut u8, sample: f32, alpha: f32, cfg: &BackgroundConfig) -> u8 {
    let one_minus_alpha = 1.0 - alpha;
    let prune = -alpha * cfg.complexity_reduction;

    let mut fits = false;
    let mut background = false;
    let mut total_weight = 0.0f32;
    let mut kept = 0usize;

    // --- 1. Decay, match and prune existing modes ---
    for m in 0..*used as usize {
        let mut mode = slots[m];
        let mut weight = one_minus_alpha * mode.weight + prune;

        if !fits {
            let d = mode.mean - sample;
            let dist2 = d * d;
            if total_weight < cfg.background_ratio && dist2 < cfg.var_threshold * mode.variance {
                background = true;
            }
            if dist2 < cfg.var_threshold_gen * mode.variance {
                fits = true;
                weight += alpha;
                let rate = alpha / weight;
                mode.mean -= rate * d;
                mode.variance = (mode.variance + rate * (dist2 - mode.variance)).clamp(cfg.var_min, cfg.var_max);
            }
        }

        if weight < -prune {
            continue;
        }
        mode.weight = weight;
        slots[kept] = mode;
        kept += 1;
        total_weight += weight;
    }

    // --- 2. Renormalize ---
    if total_weight > 0.0 {
        for mode in &mut slots[..kept] {
            mode.weight /= total_weight;
        }
    }

    // --- 3. Spawn a mode for an unexplained sample ---
    if !fits {
        if kept == slots.len() {
            kept -= 1;
        }
        let weight = if kept == 0 {
            1.0
        } else {
            for mode in &mut slots[..kept] {
                mode.weight *= one_minus_alpha;
            }
            alpha
        };
        slots[kept] = Mode {
            weight,
            mean: sample,
            variance: cfg.var_init,
        };
        kept += 1;
    }

    sort_by_weight(&mut slots[..kept]);
    *used = kept as u8;

    if background {
        BACKGROUND
    } else if cfg.detect_shadows && is_shadow(&slots[..kept], sample, cfg) {
        cfg.shadow_value
    } else {
        FOREGROUND
    }
}

/// Insertion sort, heaviest first. Mixtures hold a handful of modes.
fn sort_by_weight(modes: &mut [Mode]) {
    for i in 1..modes.len() {
        let mut j = i;
        while j > 0 && modes[j].weight > modes[j - 1].weight {
            modes.swap(j, j - 1);
            j -= 1;
        }
    }
}

fn is_shadow(modes: &[Mode], sample: f32, cfg: &BackgroundConfig) -> bool {
    let mut weight_seen = 0.0f32;
    for mode in modes {
        let numerator = mode.mean * sample;
        let denominator = mode.mean * mode.mean;
        if denominator == 0.0 {
            return false;
        }
        if numerator <= denominator && numerator >= cfg.shadow_threshold * denominator {
            let a = numerator / denominator;
            let diff = a * mode.mean - sample;
            if diff * diff < cfg.var_threshold * mode.variance * a * a {
                return true;
            }
        }
        weight_seen += mode.weight;
        if weight_seen > cfg.background_ratio {
            return false;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(width: u32, height: u32) -> BackgroundModel {
        BackgroundModel::new(width, height, BackgroundConfig::default())
    }

    #[test]
    fn learning_rate_starts_fast_and_settles() {
        let mut m = model(2, 2);
        assert_eq!(m.learning_rate(), 0.5);
        let frame = Frame::filled(2, 2, 0);
        for _ in 0..1000 {
            m.apply(&frame);
        }
        assert!((m.learning_rate() - 1.0 / 500.0).abs() < 1e-9);
    }

    #[test]
    fn first_frame_is_entirely_foreground() {
        let mut m = model(4, 4);
        let out = m.apply(&Frame::filled(4, 4, 0));
        assert!(out.as_slice().iter().all(|&v| v == FOREGROUND));
    }

    #[test]
    fn static_scene_becomes_background() {
        let mut m = model(8, 8);
        let frame = Frame::filled(8, 8, 40);
        let mut last = m.apply(&frame);
        for _ in 0..10 {
            last = m.apply(&frame);
        }
        assert!(last.as_slice().iter().all(|&v| v == BACKGROUND));
    }

    #[test]
    fn bright_intruder_is_foreground() {
        let mut m = model(8, 8);
        let scene = Frame::filled(8, 8, 0);
        for _ in 0..10 {
            m.apply(&scene);
        }
        let intruder = Frame::from_fn(8, 8, |x, y| if x == 3 && y == 3 { 255 } else { 0 });
        let out = m.apply(&intruder);
        assert_eq!(out.get(3, 3), FOREGROUND);
        assert_eq!(out.get(0, 0), BACKGROUND);
    }

    #[test]
    fn uniformly_darkened_pixel_is_a_shadow() {
        let mut m = model(4, 4);
        let scene = Frame::filled(4, 4, 200);
        for _ in 0..20 {
            m.apply(&scene);
        }
        let shaded = Frame::from_fn(4, 4, |x, _| if x == 0 { 140 } else { 200 });
        let out = m.apply(&shaded);
        assert_eq!(out.get(0, 0), 127);
        assert_eq!(out.get(2, 2), BACKGROUND);
    }

    #[test]
    fn shadows_can_be_disabled() {
        let mut m = BackgroundModel::new(
            4,
            4,
            BackgroundConfig {
                detect_shadows: false,
                ..BackgroundConfig::default()
            },
        );
        let scene = Frame::filled(4, 4, 200);
        for _ in 0..20 {
            m.apply(&scene);
        }
        let shaded = Frame::from_fn(4, 4, |x, _| if x == 0 { 140 } else { 200 });
        assert_eq!(m.apply(&shaded).get(0, 0), FOREGROUND);
    }

    #[test]
    fn mixture_never_exceeds_mode_budget() {
        let mut m = BackgroundModel::new(
            1,
            1,
            BackgroundConfig {
                max_modes: 3,
                ..BackgroundConfig::default()
            },
        );
        for v in [0u8, 60, 120, 180, 240, 30, 90] {
            m.apply(&Frame::filled(1, 1, v));
            assert!(m.modes_used[0] <= 3);
        }
        let weights: f32 = m.modes[..m.modes_used[0] as usize].iter().map(|mode| mode.weight).sum();
        assert!(weights > 0.0);
    }
}
