// THEORY:
// A `FrameSource` is whatever hands the pipeline its next grayscale frame. The
// pipeline never opens files or devices itself; the driver picks a source and pulls
// frames from it once per cycle.
//
// End of stream is `Ok(None)`, never an error. An `Err` from `read_next_frame` means
// the stream is broken and the caller should stop; there is no partial-frame recovery.

use crate::core_modules::frame::Frame;
use crate::error::{Result, TrailError};
use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const IMAGE_EXTENSIONS: [&str; 7] = ["png", "jpg", "jpeg", "bmp", "pgm", "tif", "tiff"];

pub trait FrameSource {
    /// The next frame, or `None` once the stream is exhausted.
    fn read_next_frame(&mut self) -> Result<Option<Frame>>;
}

/// Replays a directory of still images, in lexicographic file-name order, as a
/// stream of luma frames.
#[derive(Debug)]
pub struct ImageSequenceSource {
    dir: PathBuf,
    pending: VecDeque<PathBuf>,
}

impl ImageSequenceSource {
    /// Lists the image files in `dir`. Fails if the directory cannot be read or
    /// holds no images.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let unavailable = |source: io::Error| TrailError::SourceUnavailable {
            path: dir.clone(),
            source,
        };

        let mut files = Vec::new();
        for entry in fs::read_dir(&dir).map_err(unavailable)? {
            let path = entry.map_err(unavailable)?.path();
            if path.is_file() && has_image_extension(&path) {
                files.push(path);
            }
        }
        if files.is_empty() {
            return Err(unavailable(io::Error::new(
                io::ErrorKind::NotFound,
                "directory contains no image files",
            )));
        }
        files.sort();

        tracing::info!(dir = %dir.display(), frames = files.len(), "image sequence opened");
        Ok(Self {
            dir,
            pending: files.into(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Frames not yet read.
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

impl FrameSource for ImageSequenceSource {
    fn read_next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(path) = self.pending.pop_front() else {
            return Ok(None);
        };
        let image = image::open(&path).map_err(|source| TrailError::FrameDecode {
            path: path.clone(),
            source,
        })?;
        tracing::trace!(path = %path.display(), "frame decoded");
        Ok(Some(Frame::from(image.to_luma8())))
    }
}

/// Frames held in memory, replayed in insertion order.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    frames: VecDeque<Frame>,
}

impl MemorySource {
    pub fn new(frames: impl IntoIterator<Item = Frame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }

    pub fn push(&mut self, frame: Frame) {
        self.frames.push_back(frame);
    }
}

impl FromIterator<Frame> for MemorySource {
    fn from_iter<I: IntoIterator<Item = Frame>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl FrameSource for MemorySource {
    fn read_next_frame(&mut self) -> Result<Option<Frame>> {
        Ok(self.frames.pop_front())
    }
}
