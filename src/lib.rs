//! Annotation geometry and dataset preparation for LabelMe labels.
//!
//! The geometry core normalizes, expands and remaps boxes and merges
//! multi-part polygons; the pipelines built on it convert LabelMe JSON to
//! YOLO and COCO datasets, crop images around parent shapes, rename files and
//! count labels.

pub mod coco;
pub mod coco_dataset;
pub mod config;
pub mod conversion;
pub mod crop;
pub mod crop_dataset;
pub mod dataset;
pub mod error;
pub mod geometry;
pub mod io;
pub mod merge;
pub mod rename;
pub mod summary;
pub mod types;
pub mod utils;
pub mod yolo;
pub mod yolo_dataset;

// Re-export commonly used types and functions
pub use config::{Args, Format};
pub use error::{Error, Result};
pub use geometry::{BBox, CropRegion, Expansion, ImageFrame, NormalizedBox, Point, Validity};
pub use merge::merge_segments;
pub use types::{AnnotationRecord, ImageAnnotation, ProcessingStats, Shape};
pub use yolo::YoloLabelSet;
pub use yolo_dataset::process_dataset;

pub use coco::{CocoFile, CocoWriter};
pub use coco_dataset::process_coco_dataset;
pub use crop::{plan_crops, RemapPolicy, RemapStrategy};
pub use crop_dataset::process_crop_dataset;
pub use summary::count_labels_in_dir;
