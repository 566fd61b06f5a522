//! COCO format data structures and utilities
//!
//! This module holds the COCO detection/segmentation structures written by the
//! COCO converter, the polygon measurements feeding them, and the writer that
//! hands out image and annotation ids.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::error::{Error, Result};
use crate::geometry::{BBox, Point};

/// COCO category information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: u32,
    pub name: String,
}

/// COCO image information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub file_name: String,
    pub height: u32,
    pub width: u32,
    pub id: u64,
}

/// COCO annotation information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: u64,
    pub image_id: u64,
    pub category_id: u32,
    pub bbox: [f64; 4], // [x, y, width, height]
    pub area: f64,
    pub segmentation: Vec<Vec<f64>>,
    pub iscrowd: u32,
}

/// Complete COCO dataset structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CocoFile {
    pub images: Vec<Image>,
    pub annotations: Vec<Annotation>,
    pub categories: Vec<Category>,
}

/// One object instance before ids are assigned: one or more polygon parts.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceGeometry {
    pub category_id: u32,
    pub parts: Vec<Vec<Point>>,
}

impl InstanceGeometry {
    /// Bounding box over all parts, area as the sum of part areas and the
    /// flat segmentation lists. `None` for instances without area.
    pub fn measure(&self) -> Option<([f64; 4], f64, Vec<Vec<f64>>)> {
        let mut bbox: Option<BBox> = None;
        let mut area = 0.0;
        let mut segmentation = Vec::with_capacity(self.parts.len());

        for part in &self.parts {
            let ring = open_ring(part);
            let part_box = BBox::from_points(ring).ok()?;
            bbox = Some(match bbox {
                Some(b) => b.union(&part_box),
                None => part_box,
            });
            area += calculate_polygon_area(ring);
            segmentation.push(ring.iter().flat_map(|p| [p.x, p.y]).collect());
        }

        if area <= 0.0 {
            return None;
        }
        bbox.map(|b| (b.to_xywh(), area, segmentation))
    }
}

/// How image ids are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageIdScheme {
    /// `start`, `start + 1`, ...
    Sequential { start: u64 },
    /// The digits at `offset..offset + len` of the file stem form a group
    /// number `g`; the n-th image of that group (from 1) gets `g * 1000 + n`.
    GroupedByName { offset: usize, len: usize },
}

/// Running image-id counters, owned by the caller for one conversion run.
#[derive(Debug, Clone)]
pub struct ImageIdAllocator {
    scheme: ImageIdScheme,
    next_sequential: u64,
    per_group: HashMap<u64, u64>,
}

impl ImageIdAllocator {
    pub fn new(scheme: ImageIdScheme) -> Self {
        let next_sequential = match scheme {
            ImageIdScheme::Sequential { start } => start,
            ImageIdScheme::GroupedByName { .. } => 0,
        };
        Self {
            scheme,
            next_sequential,
            per_group: HashMap::new(),
        }
    }

    pub fn next_id(&mut self, file_stem: &str) -> Result<u64> {
        match self.scheme {
            ImageIdScheme::Sequential { .. } => {
                let id = self.next_sequential;
                self.next_sequential += 1;
                Ok(id)
            }
            ImageIdScheme::GroupedByName { offset, len } => {
                let digits: String = file_stem.chars().skip(offset).take(len).collect();
                if digits.chars().count() != len || !digits.chars().all(|c| c.is_ascii_digit()) {
                    return Err(Error::InvalidAnnotation(format!(
                        "image name `{}` has no {}-digit group at offset {}",
                        file_stem, len, offset
                    )));
                }
                let group: u64 = digits.parse().map_err(|_| {
                    Error::InvalidAnnotation(format!("image group `{}` is not a number", digits))
                })?;
                let counter = self.per_group.entry(group).or_insert(0);
                *counter += 1;
                Ok(group * 1000 + *counter)
            }
        }
    }
}

/// Writer for COCO format datasets
pub struct CocoWriter {
    image_ids: ImageIdAllocator,
    next_annotation_id: u64,
    categories: BTreeMap<u32, String>,
    images: Vec<Image>,
    annotations: Vec<Annotation>,
}

impl CocoWriter {
    /// Create a new COCO writer with the given id scheme
    pub fn new(scheme: ImageIdScheme) -> Self {
        Self {
            image_ids: ImageIdAllocator::new(scheme),
            next_annotation_id: 1,
            categories: BTreeMap::new(),
            images: Vec::new(),
            annotations: Vec::new(),
        }
    }

    /// Register a category; the first name seen for an id is kept.
    pub fn add_category(&mut self, id: u32, name: &str) {
        self.categories
            .entry(id)
            .or_insert_with(|| name.to_string());
    }

    /// Add an image and its instances. Returns the image id and the number of
    /// instances dropped for having no area.
    pub fn add_image(
        &mut self,
        file_name: String,
        width: u32,
        height: u32,
        instances: &[InstanceGeometry],
    ) -> Result<(u64, usize)> {
        let stem = std::path::Path::new(&file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&file_name)
            .to_string();
        let image_id = self.image_ids.next_id(&stem)?;

        self.images.push(Image {
            file_name,
            height,
            width,
            id: image_id,
        });

        let mut dropped = 0;
        for instance in instances {
            match instance.measure() {
                Some((bbox, area, segmentation)) => {
                    self.annotations.push(Annotation {
                        id: self.next_annotation_id,
                        image_id,
                        category_id: instance.category_id,
                        bbox,
                        area,
                        segmentation,
                        iscrowd: 0,
                    });
                    self.next_annotation_id += 1;
                }
                None => dropped += 1,
            }
        }
        Ok((image_id, dropped))
    }

    /// Take the images and annotations gathered so far as one COCO file,
    /// keeping the id counters running for the next split.
    pub fn finish_split(&mut self) -> CocoFile {
        CocoFile {
            images: std::mem::take(&mut self.images),
            annotations: std::mem::take(&mut self.annotations),
            categories: self
                .categories
                .iter()
                .map(|(&id, name)| Category {
                    id,
                    name: name.clone(),
                })
                .collect(),
        }
    }
}

/// Calculate polygon area using the shoelace formula
pub fn calculate_polygon_area(polygon: &[Point]) -> f64 {
    if polygon.len() < 3 {
        return 0.0;
    }

    let n = polygon.len();
    let twice_area: f64 = (0..n)
        .map(|i| {
            let (a, b) = (polygon[i], polygon[(i + 1) % n]);
            a.x * b.y - b.x * a.y
        })
        .sum();

    twice_area.abs() / 2.0
}

/// Drop a repeated closing vertex.
fn open_ring(points: &[Point]) -> &[Point] {
    match points {
        [first, .., last] if points.len() >= 4 && first == last => &points[..points.len() - 1],
        _ => points,
    }
}
