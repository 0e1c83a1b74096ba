// THEORY:
// The `pipeline` module is the top-level API for the entire tracking engine. It wires
// the stages into one synchronous call so a driver only has to decide *when* to run
// it, never *how*.
//
// Per frame, in order:
//   Stage 1: Preprocess   (smoothing + static threshold or background subtraction)
//   Stage 2: Extract      (external contours, area/shape filters, centroids)
//   Stage 3: Track        (append every accepted centroid to the global trail)
//   Stage 4: Log          (emit one record per accepted centroid while a session is open)
//
// The parameters are an explicit snapshot handed in per call. Stream time is handed
// in as well, measured from the start of the stream; it drives both the trail's
// inactivity window and the log timestamps, so the two always agree.

use crate::core_modules::background::BackgroundConfig;
use crate::core_modules::blob::{Blob, BlobObservation};
use crate::core_modules::blob_extractor::blob_extractor;
use crate::core_modules::event_logger::{AppendFile, EventLogger, LogRecord, SessionState, SinkFactory};
use crate::core_modules::filters::Polarity;
use crate::core_modules::frame::{Frame, Mask};
use crate::core_modules::params::Parameters;
use crate::core_modules::preprocessor::{DEFAULT_CLOSING_KERNEL_SIZE, Preprocessor, SegmentationMode};
use crate::core_modules::render::RenderOutputs;
use crate::core_modules::trail::{INACTIVITY_WINDOW, TrailTracker};
use crate::error::Result;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the TrailPipeline, fixed for the lifetime of a stream.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub mode: SegmentationMode,
    /// Threshold polarity in static mode. Background subtraction ignores it.
    pub polarity: Polarity,
    /// Side of the closing element used after background subtraction.
    pub closing_kernel_size: u32,
    pub trail_enabled: bool,
    /// When false the logger is never built and toggle requests are ignored.
    pub logging_enabled: bool,
    /// Upper bound on retained trail points. `None` keeps the full history.
    pub trail_capacity: Option<usize>,
    pub inactivity_window: Duration,
    pub background: BackgroundConfig,
    /// Destination of the trajectory log.
    pub log_path: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: SegmentationMode::StaticThreshold,
            polarity: Polarity::Inverted,
            closing_kernel_size: DEFAULT_CLOSING_KERNEL_SIZE,
            trail_enabled: true,
            logging_enabled: true,
            trail_capacity: None,
            inactivity_window: INACTIVITY_WINDOW,
            background: BackgroundConfig::default(),
            log_path: PathBuf::from("centroids.csv"),
        }
    }
}

/// Everything one pipeline run produced.
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub mask: Mask,
    /// Accepted blobs in contour discovery order.
    pub blobs: Vec<Blob>,
    /// The trail after this frame's observations were appended, oldest first.
    pub trail: Vec<(f64, f64)>,
    /// Records written during this frame.
    pub records: Vec<LogRecord>,
}

impl FrameReport {
    pub fn observations(&self) -> impl Iterator<Item = &BlobObservation> {
        self.blobs.iter().map(|blob| &blob.observation)
    }

    /// Paints the display images for `frame`, which must be the frame this report
    /// was produced from.
    pub fn render(&self, frame: &Frame) -> RenderOutputs {
        RenderOutputs::new(frame, &self.mask, &self.blobs, &self.trail)
    }
}

/// The main, top-level struct for the tracking engine.
pub struct TrailPipeline<F: SinkFactory = AppendFile> {
    preprocessor: Preprocessor,
    tracker: Option<TrailTracker>,
    logger: Option<EventLogger<F>>,
    frames_processed: u64,
}

impl TrailPipeline<AppendFile> {
    /// Builds a pipeline that logs to `config.log_path`.
    pub fn new(config: PipelineConfig) -> Self {
        let factory = AppendFile::new(config.log_path.clone());
        Self::with_sink(config, factory)
    }
}

impl<F: SinkFactory> TrailPipeline<F> {
    /// Builds a pipeline that logs through `factory`.
    pub fn with_sink(config: PipelineConfig, factory: F) -> Self {
        let preprocessor = Preprocessor::new(
            config.mode,
            config.polarity,
            config.closing_kernel_size,
            config.background,
        );
        let tracker = config
            .trail_enabled
            .then(|| TrailTracker::new(config.inactivity_window, config.trail_capacity));
        let logger = config.logging_enabled.then(|| EventLogger::new(factory));
        Self {
            preprocessor,
            tracker,
            logger,
            frames_processed: 0,
        }
    }

    /// Runs every stage on `frame`. `now` is the stream time of this frame.
    ///
    /// A failing log write closes the session and is reported here; it never stops
    /// the frame from being processed.
    pub fn run(&mut self, frame: &Frame, params: &Parameters, now: Duration) -> FrameReport {
        // --- 1. Preprocess ---
        let mask = self.preprocessor.preprocess(frame, params);

        // --- 2. Extract ---
        let blobs = blob_extractor::extract_blobs(&mask, params);

        // --- 3 & 4. Track and log each accepted observation in discovery order ---
        let mut records = Vec::new();
        for blob in &blobs {
            if let Some(tracker) = self.tracker.as_mut() {
                tracker.update(&blob.observation, now);
            }
            if let Some(logger) = self.logger.as_mut() {
                match logger.log_if_open(&blob.observation, now) {
                    Ok(Some(record)) => records.push(record),
                    Ok(None) => {}
                    Err(err) => {
                        tracing::warn!(error = %err, "log write failed, logging session closed");
                    }
                }
            }
        }

        let trail = self.tracker.as_ref().map(TrailTracker::snapshot).unwrap_or_default();
        self.frames_processed += 1;

        tracing::debug!(
            frame = self.frames_processed,
            foreground = mask.foreground_count(),
            blobs = blobs.len(),
            trail = trail.len(),
            logged = records.len(),
            "frame processed"
        );

        FrameReport {
            mask,
            blobs,
            trail,
            records,
        }
    }

    /// Flips the logging session. With logging disabled the session stays closed.
    pub fn toggle_logging(&mut self) -> Result<SessionState> {
        match self.logger.as_mut() {
            Some(logger) => logger.toggle(),
            None => {
                tracing::warn!("logging is disabled in the pipeline configuration");
                Ok(SessionState::Closed)
            }
        }
    }

    pub fn open_log(&mut self) -> Result<()> {
        match self.logger.as_mut() {
            Some(logger) => logger.open(),
            None => Ok(()),
        }
    }

    pub fn close_log(&mut self) -> Result<()> {
        match self.logger.as_mut() {
            Some(logger) => logger.close(),
            None => Ok(()),
        }
    }

    pub fn logging_state(&self) -> SessionState {
        self.logger.as_ref().map(EventLogger::state).unwrap_or(SessionState::Closed)
    }

    pub fn logger(&self) -> Option<&EventLogger<F>> {
        self.logger.as_ref()
    }

    pub fn tracker(&self) -> Option<&TrailTracker> {
        self.tracker.as_ref()
    }

    pub fn mode(&self) -> SegmentationMode {
        self.preprocessor.mode()
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }
}
