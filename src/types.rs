use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use crate::error::{Error, Result};
use crate::geometry::{BBox, ImageFrame, Point};

// Supported image formats
pub const IMG_FORMATS: &[&str] = &[
    "bmp", "dng", "jpeg", "jpg", "mpo", "png", "tif", "tiff", "webp", "pfm",
];

// Precomputed HashSet of image extensions for fast lookup
pub static IMAGE_EXTENSIONS_SET: OnceLock<HashSet<String>> = OnceLock::new();

/// Get the image extensions set
pub fn get_image_extensions_set() -> &'static HashSet<String> {
    IMAGE_EXTENSIONS_SET.get_or_init(|| IMG_FORMATS.iter().map(|ext| ext.to_lowercase()).collect())
}

/// Number of vertices used to approximate a circle shape.
pub const CIRCLE_POINTS: usize = 12;

// A shape as stored in a LabelMe JSON file
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Shape {
    pub label: String,
    pub points: Option<Vec<(f64, f64)>>,
    pub group_id: Option<i64>,
    #[serde(default = "default_shape_type")]
    pub shape_type: String,
    pub description: Option<String>,
    pub mask: Option<String>,
}

fn default_shape_type() -> String {
    "polygon".to_string()
}

// The annotation of one image as stored in a LabelMe JSON file
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ImageAnnotation {
    #[serde(default)]
    pub version: String,
    pub flags: Option<HashMap<String, bool>>,
    #[serde(default)]
    pub shapes: Vec<Shape>,
    #[serde(default)]
    pub image_path: String,
    pub image_data: Option<String>,
    pub image_height: Option<u32>,
    pub image_width: Option<u32>,
}

impl ImageAnnotation {
    /// Check the record and turn its shapes into typed geometry.
    ///
    /// A missing or zero image size fails the whole record. Shapes are checked
    /// one by one; a bad shape is reported in
    /// [`AnnotationRecord::rejected`] and the others are kept.
    pub fn validate(&self) -> Result<AnnotationRecord> {
        let width = self
            .image_width
            .ok_or_else(|| Error::InvalidAnnotation("missing field `imageWidth`".to_string()))?;
        let height = self
            .image_height
            .ok_or_else(|| Error::InvalidAnnotation("missing field `imageHeight`".to_string()))?;
        let frame = ImageFrame::new(width, height)?;

        let mut shapes = Vec::with_capacity(self.shapes.len());
        let mut rejected = Vec::new();
        for (index, shape) in self.shapes.iter().enumerate() {
            match ShapeRecord::from_shape(shape) {
                Ok(record) => shapes.push(record),
                Err(error) => rejected.push(RejectedShape {
                    index,
                    label: shape.label.clone(),
                    error,
                }),
            }
        }

        Ok(AnnotationRecord {
            frame,
            shapes,
            rejected,
        })
    }
}

/// A validated annotation record.
#[derive(Debug, Clone)]
pub struct AnnotationRecord {
    pub frame: ImageFrame,
    pub shapes: Vec<ShapeRecord>,
    pub rejected: Vec<RejectedShape>,
}

/// A shape that failed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedShape {
    pub index: usize,
    pub label: String,
    pub error: Error,
}

/// Shape label split into its class name and optional instance tag.
///
/// Labels such as `person-3` or `aqm-3` tie a child to a parent sharing the
/// same tag. The name is lowercased; a label without `-` has no tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShapeLabel {
    pub raw: String,
    pub name: String,
    pub tag: Option<String>,
}

impl ShapeLabel {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let (name, tag) = match trimmed.split_once('-') {
            Some((name, tag)) if !tag.is_empty() => (name, Some(tag.to_string())),
            Some((name, _)) => (name, None),
            None => (trimmed, None),
        };
        Self {
            raw: raw.to_string(),
            name: name.to_lowercase(),
            tag,
        }
    }
}

/// Geometry of one shape, by LabelMe `shape_type`.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeGeometry {
    /// Two opposite corners in any order.
    Rectangle([Point; 2]),
    Circle { center: Point, radius: f64 },
    /// Polygons, line strips and anything else given as a vertex list.
    Polygon(Vec<Point>),
}

impl ShapeGeometry {
    pub fn bbox(&self) -> Result<BBox> {
        match self {
            ShapeGeometry::Rectangle(corners) => BBox::from_points(corners),
            ShapeGeometry::Circle { center, radius } => BBox::new(
                center.x - radius,
                center.y - radius,
                center.x + radius,
                center.y + radius,
            ),
            ShapeGeometry::Polygon(points) => BBox::from_points(points),
        }
    }

    /// Vertex outline: four corners for a rectangle, a regular polygon for a
    /// circle, the vertices themselves otherwise.
    pub fn outline(&self) -> Vec<Point> {
        match self {
            ShapeGeometry::Rectangle([a, b]) => vec![
                Point::new(a.x, a.y),
                Point::new(b.x, a.y),
                Point::new(b.x, b.y),
                Point::new(a.x, b.y),
            ],
            ShapeGeometry::Circle { center, radius } => (0..CIRCLE_POINTS)
                .map(|i| {
                    let angle = 2.0 * std::f64::consts::PI * i as f64 / CIRCLE_POINTS as f64;
                    Point::new(
                        center.x + radius * angle.cos(),
                        center.y + radius * angle.sin(),
                    )
                })
                .collect(),
            ShapeGeometry::Polygon(points) => points.clone(),
        }
    }
}

/// A validated shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeRecord {
    pub label: ShapeLabel,
    pub group_id: Option<i64>,
    pub geometry: ShapeGeometry,
}

impl ShapeRecord {
    pub fn from_shape(shape: &Shape) -> Result<Self> {
        let points: Vec<Point> = shape
            .points
            .as_ref()
            .ok_or_else(|| {
                Error::InvalidAnnotation(format!("shape `{}` has no `points`", shape.label))
            })?
            .iter()
            .map(|&p| Point::from(p))
            .collect();

        if points.len() < 2 {
            return Err(Error::InvalidGeometry(format!(
                "{} shape `{}` needs at least 2 points, got {}",
                shape.shape_type,
                shape.label,
                points.len()
            )));
        }
        if points.iter().any(|p| !(p.x.is_finite() && p.y.is_finite())) {
            return Err(Error::InvalidGeometry(format!(
                "shape `{}` has non-finite coordinates",
                shape.label
            )));
        }

        let geometry = match shape.shape_type.as_str() {
            "rectangle" => ShapeGeometry::Rectangle([points[0], points[1]]),
            "circle" => {
                let (center, rim) = (points[0], points[1]);
                ShapeGeometry::Circle {
                    center,
                    radius: center.distance_squared(&rim).sqrt(),
                }
            }
            _ => ShapeGeometry::Polygon(points),
        };

        Ok(Self {
            label: ShapeLabel::parse(&shape.label),
            group_id: shape.group_id,
            geometry,
        })
    }

    /// Key tying shapes of one instance together: the label tag, else the
    /// numeric `group_id`.
    pub fn instance_key(&self) -> Option<String> {
        self.label
            .tag
            .clone()
            .or_else(|| self.group_id.map(|id| id.to_string()))
    }
}

// Struct to hold processing statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProcessingStats {
    pub total_files_processed: usize,
    pub successful_conversions: usize,
    pub skipped_missing_image: usize,
    pub failed_conversions: usize,
    pub shapes_written: usize,
    pub shapes_discarded: usize,
    pub shapes_rejected: usize,
}

impl ProcessingStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(mut self, other: ProcessingStats) -> Self {
        self.total_files_processed += other.total_files_processed;
        self.successful_conversions += other.successful_conversions;
        self.skipped_missing_image += other.skipped_missing_image;
        self.failed_conversions += other.failed_conversions;
        self.shapes_written += other.shapes_written;
        self.shapes_discarded += other.shapes_discarded;
        self.shapes_rejected += other.shapes_rejected;
        self
    }

    pub fn print_summary(&self) {
        log::info!("=== Processing Summary ===");
        log::info!("Total files processed: {}", self.total_files_processed);
        log::info!("Successful conversions: {}", self.successful_conversions);
        log::info!("Shapes written: {}", self.shapes_written);
        log::info!("Failed conversions: {}", self.failed_conversions);

        if self.skipped_missing_image > 0 {
            log::warn!(
                "Skipped (image file not found and no image data): {}",
                self.skipped_missing_image
            );
        }
        if self.shapes_discarded > 0 || self.shapes_rejected > 0 {
            log::warn!(
                "Shapes dropped: {} (degenerate or out of range: {}, invalid: {})",
                self.shapes_discarded + self.shapes_rejected,
                self.shapes_discarded,
                self.shapes_rejected
            );
        }
    }
}
