use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Everything the library can fail with.
#[derive(Debug, Error)]
pub enum TrailError {
    #[error("frame source {path} is unavailable")]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to decode frame {path}")]
    FrameDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("log sink {path} could not be opened")]
    LogSinkUnavailable {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to write log record")]
    LogWrite(#[source] io::Error),

    #[error("invalid configuration")]
    Config(#[from] toml::de::Error),

    #[error("failed to read configuration file {path}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to render output")]
    Render(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, TrailError>;
