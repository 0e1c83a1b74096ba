// THEORY:
// The `Preprocessor` is the first stage of the per-frame pipeline. It turns a raw
// grayscale frame into the binary mask the blob extractor reads.
//
// Every frame is smoothed first with `blur_kernel_size`. After that one of two
// segmentation modes applies:
//
// - `StaticThreshold`: the smoothed frame is binarized directly. The default polarity
//   is inverted (dark objects on a bright, fixed scene).
// - `BackgroundSubtraction`: the smoothed frame feeds a mixture-of-Gaussians model
//   that returns a per-pixel likelihood. That likelihood is smoothed again with
//   `foreground_mask_blur_kernel_size`, binarized with normal polarity and finally
//   closed with a square structuring element so fragmented regions merge into one.
//
// The background model is the only state this stage owns. It is created lazily from
// the first frame's dimensions. A stream is expected to keep a stable frame size; if
// it does not, the model is discarded and relearned rather than failing.

use crate::core_modules::background::{BackgroundConfig, BackgroundModel};
use crate::core_modules::filters::{Polarity, close, gaussian_blur, threshold};
use crate::core_modules::frame::{Frame, Mask};
use crate::core_modules::params::{Parameters, normalize_kernel_size};
use serde::Deserialize;

/// Side of the closing structuring element used after background subtraction.
pub const DEFAULT_CLOSING_KERNEL_SIZE: u32 = 15;

/// How the smoothed frame is segmented into foreground and background.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentationMode {
    #[default]
    StaticThreshold,
    BackgroundSubtraction,
}

pub struct Preprocessor {
    mode: SegmentationMode,
    /// Polarity of the static threshold. Background subtraction always uses `Normal`.
    static_polarity: Polarity,
    closing_kernel_size: u32,
    background_config: BackgroundConfig,
    background: Option<BackgroundModel>,
}

impl Preprocessor {
    pub fn new(
        mode: SegmentationMode,
        static_polarity: Polarity,
        closing_kernel_size: u32,
        background_config: BackgroundConfig,
    ) -> Self {
        Self {
            mode,
            static_polarity,
            closing_kernel_size: normalize_kernel_size(closing_kernel_size),
            background_config,
            background: None,
        }
    }

    pub fn static_threshold(polarity: Polarity) -> Self {
        Self::new(
            SegmentationMode::StaticThreshold,
            polarity,
            DEFAULT_CLOSING_KERNEL_SIZE,
            BackgroundConfig::default(),
        )
    }

    pub fn background_subtraction(config: BackgroundConfig) -> Self {
        Self::new(
            SegmentationMode::BackgroundSubtraction,
            Polarity::Normal,
            DEFAULT_CLOSING_KERNEL_SIZE,
            config,
        )
    }

    pub fn mode(&self) -> SegmentationMode {
        self.mode
    }

    /// Number of frames the background model has learned from, if one exists.
    pub fn background_frames_seen(&self) -> Option<u64> {
        self.background.as_ref().map(BackgroundModel::frames_seen)
    }

    pub fn preprocess(&mut self, frame: &Frame, params: &Parameters) -> Mask {
        let params = params.normalized();
        let smoothed = gaussian_blur(frame, params.blur_kernel_size);

        match self.mode {
            SegmentationMode::StaticThreshold => {
                threshold(&smoothed, params.threshold_level, self.static_polarity)
            }
            SegmentationMode::BackgroundSubtraction => {
                let model = self.background_model_for(frame);
                let likelihood = model.apply(&smoothed);
                let likelihood = gaussian_blur(&likelihood, params.foreground_mask_blur_kernel_size);
                let binary = threshold(&likelihood, params.threshold_level, Polarity::Normal);
                close(&binary, self.closing_kernel_size)
            }
        }
    }

    fn background_model_for(&mut self, frame: &Frame) -> &mut BackgroundModel {
        let dims = frame.dimensions();
        if let Some(model) = &self.background {
            if model.dimensions() != dims {
                tracing::warn!(
                    previous = ?model.dimensions(),
                    current = ?dims,
                    "frame size changed mid-stream, relearning background"
                );
                self.background = None;
            }
        }
        self.background.get_or_insert_with(|| {
            BackgroundModel::new(dims.0, dims.1, self.background_config.clone())
        })
    }
}
