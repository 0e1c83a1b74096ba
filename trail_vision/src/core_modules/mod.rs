pub mod background;
pub mod blob;
pub mod blob_extractor;
pub mod contour;
pub mod event_logger;
pub mod filters;
pub mod frame;
pub mod geometry;
pub mod params;
pub mod preprocessor;
pub mod render;
pub mod trail;
