// THEORY:
// The control surface is modelled as a stream of `ControlCommand`s instead of widget
// callbacks. Slider moves become parameter writes, the `s` key toggles the logging
// session and Esc (or `q`) stops the run. Commands are parsed from short text lines
// so any front end (a terminal, a socket, a test script) can drive the pipeline.
//
// Parameter writes land in `SharedParameters` and take effect at the start of the
// next frame. Session toggles go straight to the pipeline; since all commands
// arrive through one channel they are serialized by construction.

use crate::core_modules::event_logger::{SessionState, SinkFactory};
use crate::core_modules::params::SharedParameters;
use crate::pipeline::TrailPipeline;
use std::str::FromStr;
use thiserror::Error;

/// One action from the control surface. Slider values are raw and unclamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    SetThreshold(i64),
    SetBlurKernel(i64),
    SetForegroundBlurKernel(i64),
    SetMinArea(i64),
    SetMaxArea(i64),
    /// Hundredths; `None` turns the aspect-ratio filter off.
    SetAspectCutoff(Option<i64>),
    ToggleLogging,
    Stop,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized control command: {0}")]
pub struct ParseCommandError(String);

impl FromStr for ControlCommand {
    type Err = ParseCommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let name = words.next().unwrap_or("").to_ascii_lowercase();
        let value = words.next();
        let invalid = || ParseCommandError(line.trim().to_string());
        let number = || -> Result<i64, ParseCommandError> {
            value.and_then(|v| v.parse::<i64>().ok()).ok_or_else(invalid)
        };

        let command = match name.as_str() {
            "s" => ControlCommand::ToggleLogging,
            "q" | "esc" | "quit" => ControlCommand::Stop,
            "threshold" => ControlCommand::SetThreshold(number()?),
            "blur" => ControlCommand::SetBlurKernel(number()?),
            "fgblur" => ControlCommand::SetForegroundBlurKernel(number()?),
            "min" => ControlCommand::SetMinArea(number()?),
            "max" => ControlCommand::SetMaxArea(number()?),
            "aspect" => match value {
                Some(v) if v.eq_ignore_ascii_case("off") => ControlCommand::SetAspectCutoff(None),
                _ => ControlCommand::SetAspectCutoff(Some(number()?)),
            },
            _ => return Err(invalid()),
        };
        if words.next().is_some() {
            return Err(invalid());
        }
        Ok(command)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOutcome {
    Continue,
    Stop,
}

/// Routes `command` to the parameter store or the logging session.
///
/// A session that cannot be opened is reported and left closed; processing goes on.
pub fn apply<F: SinkFactory>(
    command: ControlCommand,
    params: &SharedParameters,
    pipeline: &mut TrailPipeline<F>,
) -> ControlOutcome {
    match command {
        ControlCommand::SetThreshold(v) => params.set_threshold_level(v),
        ControlCommand::SetBlurKernel(v) => params.set_blur_kernel_size(v),
        ControlCommand::SetForegroundBlurKernel(v) => params.set_foreground_mask_blur_kernel_size(v),
        ControlCommand::SetMinArea(v) => params.set_min_blob_area(v),
        ControlCommand::SetMaxArea(v) => params.set_max_blob_area(v),
        ControlCommand::SetAspectCutoff(v) => params.set_aspect_ratio_cutoff(v),
        ControlCommand::ToggleLogging => match pipeline.toggle_logging() {
            Ok(SessionState::Open) => tracing::info!("logging started"),
            Ok(SessionState::Closed) => tracing::info!("logging stopped"),
            Err(err) => tracing::warn!(error = %err, "could not toggle logging, session stays closed"),
        },
        ControlCommand::Stop => return ControlOutcome::Stop,
    }
    tracing::debug!(?command, "control command applied");
    ControlOutcome::Continue
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::event_logger::SharedBuffer;
    use crate::pipeline::PipelineConfig;

    #[test]
    fn parses_every_command() {
        assert_eq!("threshold 140".parse(), Ok(ControlCommand::SetThreshold(140)));
        assert_eq!("blur 8".parse(), Ok(ControlCommand::SetBlurKernel(8)));
        assert_eq!("fgblur 5".parse(), Ok(ControlCommand::SetForegroundBlurKernel(5)));
        assert_eq!("min 50".parse(), Ok(ControlCommand::SetMinArea(50)));
        assert_eq!("MAX 10000".parse(), Ok(ControlCommand::SetMaxArea(10_000)));
        assert_eq!("aspect 80".parse(), Ok(ControlCommand::SetAspectCutoff(Some(80))));
        assert_eq!("aspect off".parse(), Ok(ControlCommand::SetAspectCutoff(None)));
        assert_eq!("s".parse(), Ok(ControlCommand::ToggleLogging));
        assert_eq!(" esc ".parse(), Ok(ControlCommand::Stop));
    }

    #[test]
    fn parse_error_names_the_offending_line() {
        let err = "  zoom 2 ".parse::<ControlCommand>().unwrap_err();
        assert_eq!(err.to_string(), "unrecognized control command: zoom 2");
        let boxed: Box<dyn std::error::Error> = Box::new(err);
        assert!(boxed.source().is_none());
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!("".parse::<ControlCommand>().is_err());
        assert!("threshold".parse::<ControlCommand>().is_err());
        assert!("threshold high".parse::<ControlCommand>().is_err());
        assert!("blur 3 5".parse::<ControlCommand>().is_err());
        assert!("zoom 2".parse::<ControlCommand>().is_err());
    }

    #[test]
    fn slider_writes_are_clamped_and_normalized() {
        let params = SharedParameters::default();
        let mut pipeline = TrailPipeline::with_sink(PipelineConfig::default(), SharedBuffer::new());
        for command in [
            ControlCommand::SetThreshold(-3),
            ControlCommand::SetBlurKernel(14),
            ControlCommand::SetForegroundBlurKernel(99),
            ControlCommand::SetMinArea(1_000),
            ControlCommand::SetMaxArea(-1),
            ControlCommand::SetAspectCutoff(Some(500)),
        ] {
            assert_eq!(apply(command, &params, &mut pipeline), ControlOutcome::Continue);
        }
        let snapshot = params.snapshot();
        assert_eq!(snapshot.threshold_level, 0);
        assert_eq!(snapshot.blur_kernel_size, 15);
        assert_eq!(snapshot.foreground_mask_blur_kernel_size, 15);
        assert_eq!(snapshot.min_blob_area, 500.0);
        assert_eq!(snapshot.max_blob_area, 0.0);
        assert_eq!(snapshot.aspect_ratio_cutoff, Some(1.2));
    }

    #[test]
    fn toggle_and_stop() {
        let params = SharedParameters::default();
        let buffer = SharedBuffer::new();
        let mut pipeline = TrailPipeline::with_sink(PipelineConfig::default(), buffer.clone());
        apply(ControlCommand::ToggleLogging, &params, &mut pipeline);
        assert_eq!(pipeline.logging_state(), SessionState::Open);
        apply(ControlCommand::ToggleLogging, &params, &mut pipeline);
        assert_eq!(pipeline.logging_state(), SessionState::Closed);
        assert_eq!(buffer.contents(), "ID, X, Y, Time\n");
        assert_eq!(apply(ControlCommand::Stop, &params, &mut pipeline), ControlOutcome::Stop);
    }
}
