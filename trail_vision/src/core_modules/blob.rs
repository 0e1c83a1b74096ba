// THEORY:
// A `Blob` is one connected foreground region that survived the size and shape
// filters in a single frame. It is a "dumb" data container: it carries the boundary
// it was measured from plus the `BlobObservation` summary the rest of the pipeline
// consumes (tracker, event logger, renderer). It has no memory of earlier frames.

use crate::core_modules::contour::Contour;

/// The measured properties of one accepted blob, valid only for the frame that
/// produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlobObservation {
    /// Unsigned polygon area of the outer boundary.
    pub area: f64,
    /// Width over height of the minimum-area bounding rectangle. Only measured when
    /// aspect-ratio filtering is enabled.
    pub aspect_ratio: Option<f64>,
    /// Area-weighted centre, `(m10 / m00, m01 / m00)`.
    pub centroid: (f64, f64),
}

/// An accepted blob together with the boundary it was measured from.
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    pub contour: Contour,
    pub observation: BlobObservation,
}
