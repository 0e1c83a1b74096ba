// THEORY:
// The `blob_extractor` is the engine of the spatial grouping stage. It turns the
// binary mask of a single frame into the list of blobs worth tracking.
//
// Algorithm steps:
// 1.  **Boundary Discovery**: External contours of the mask are found (see `contour`).
//     Holes and regions nested inside holes never become blobs.
// 2.  **Area Filter**: The unsigned polygon area must satisfy
//     `min_blob_area < area < max_blob_area`. Both bounds are exclusive.
// 3.  **Shape Filter**: When an aspect-ratio cutoff is configured, the width/height
//     ratio of the minimum-area rectangle must be strictly below it. A rectangle
//     with zero height has no ratio and is rejected rather than divided by.
// 4.  **Centroid**: Only now are the first moments divided by the area. Because the
//     area filter rejects every area <= `min_blob_area` (which is never negative),
//     no zero-area shape ever reaches the division.
// 5.  **Stateless Utility**: Output order is contour discovery order. Nothing is
//     remembered between calls.

use crate::core_modules::blob::{Blob, BlobObservation};
use crate::core_modules::contour::find_external_contours;
use crate::core_modules::frame::Mask;
use crate::core_modules::geometry::{Moments, min_area_rect};
use crate::core_modules::params::Parameters;

pub mod blob_extractor {
    use super::*;

    /// Finds every blob in `mask` that passes the filters in `params`, keeping the
    /// boundary alongside each observation.
    pub fn extract_blobs(mask: &Mask, params: &Parameters) -> Vec<Blob> {
        let params = params.normalized();
        let mut blobs = Vec::new();

        for contour in find_external_contours(mask) {
            let moments = Moments::of_polygon(&contour.points);
            let area = moments.area();
            if !area_in_bounds(area, &params) {
                continue;
            }

            let aspect_ratio = match params.aspect_ratio_cutoff {
                Some(cutoff) => match min_area_rect(&contour.points).aspect_ratio() {
                    Some(ratio) if ratio < cutoff => Some(ratio),
                    _ => continue,
                },
                None => None,
            };

            let observation = BlobObservation {
                area,
                aspect_ratio,
                centroid: moments.centroid(),
            };
            blobs.push(Blob { contour, observation });
        }

        tracing::trace!(accepted = blobs.len(), "blob extraction finished");
        blobs
    }

    /// The observation-only view of `extract_blobs`.
    pub fn extract(mask: &Mask, params: &Parameters) -> Vec<BlobObservation> {
        extract_blobs(mask, params)
            .into_iter()
            .map(|blob| blob.observation)
            .collect()
    }

    /// `min < area < max`, with a zero area always rejected.
    pub fn area_in_bounds(area: f64, params: &Parameters) -> bool {
        area > 0.0 && area > params.min_blob_area && area < params.max_blob_area
    }
}
