//! Planning of parent-anchored crops.
//!
//! A parent shape (typically a person) is expanded into a crop region and the
//! child shapes (safety gear) that belong to it are moved into the crop's
//! coordinates. Nothing here touches pixels or files; the crop pipeline turns
//! a [`CropPlan`] into images and label files.

use std::collections::{HashMap, HashSet};

use crate::error::Result;
use crate::geometry::{
    assign_by_containment, Assignment, BBox, CropRegion, Expansion, ImageFrame, ParentRegion,
    Validity,
};
use crate::types::AnnotationRecord;
use crate::yolo::YoloLabelSet;

/// How child shapes find their parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemapStrategy {
    /// Children join the parent sharing their instance key and are translated
    /// into its region. A child without a key joins the only parent when there
    /// is exactly one. Unmatched children are dropped.
    Translate,
    /// Children join the first parent whose unexpanded box contains them,
    /// with proportional rescaling onto the expanded region. Unmatched
    /// children pass through in source coordinates.
    Containment,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RemapPolicy {
    pub expansion: Expansion,
    pub strategy: RemapStrategy,
    pub validity: Validity,
    /// Parents narrower than this (pixels) do not produce a crop.
    pub min_parent_width: f64,
}

/// Labels taking part in a crop run.
#[derive(Debug, Clone)]
pub struct CropLabels {
    pub parent: String,
    /// Child label names; the class id of a child is its index here.
    pub children: Vec<String>,
}

impl CropLabels {
    pub fn new(parent: &str, children: &[String]) -> Self {
        Self {
            parent: parent.trim().to_lowercase(),
            children: children.iter().map(|c| c.trim().to_lowercase()).collect(),
        }
    }

    fn child_class(&self, name: &str) -> Option<u32> {
        self.children
            .iter()
            .position(|c| c == name)
            .map(|i| i as u32)
    }
}

/// One crop to cut out of the source image.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedCrop {
    /// Name of the crop, unique within its record: the parent's instance
    /// key, or its 1-based position when it has none. Clashing names get a
    /// `_<position>` suffix.
    pub key: String,
    pub region: CropRegion,
    pub frame: ImageFrame,
    pub labels: YoloLabelSet,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CropPlan {
    pub crops: Vec<PlannedCrop>,
    /// Children no parent claimed, normalized against the source frame.
    /// Only filled under [`RemapStrategy::Containment`].
    pub passthrough: YoloLabelSet,
    /// Child boxes dropped as degenerate, out of range, duplicate or
    /// unmatched.
    pub discarded: usize,
    /// Parents ignored for being too narrow or yielding an empty region.
    pub skipped_parents: usize,
}

struct Parent {
    tag: Option<String>,
    ordinal: usize,
    key: String,
    original: BBox,
    region: CropRegion,
    frame: ImageFrame,
}

/// Work out the crops of one record and the labels that go into each.
pub fn plan_crops(
    record: &AnnotationRecord,
    labels: &CropLabels,
    policy: &RemapPolicy,
) -> Result<CropPlan> {
    let mut plan = CropPlan::default();
    let mut parents = Vec::new();

    for (ordinal, shape) in record
        .shapes
        .iter()
        .filter(|s| s.label.name == labels.parent)
        .enumerate()
    {
        let original = shape.geometry.bbox()?;
        if original.width() < policy.min_parent_width {
            plan.skipped_parents += 1;
            continue;
        }
        let region = CropRegion::snapped(original.expand(policy.expansion, record.frame));
        let frame = match region.frame() {
            Ok(frame) => frame,
            Err(_) => {
                plan.skipped_parents += 1;
                continue;
            }
        };
        parents.push(Parent {
            tag: shape.instance_key(),
            ordinal: ordinal + 1,
            key: String::new(),
            original,
            region,
            frame,
        });
    }

    assign_crop_keys(&mut parents);

    let mut crop_labels: Vec<YoloLabelSet> = vec![YoloLabelSet::new(); parents.len()];
    let mut by_key: HashMap<&str, usize> = HashMap::new();
    for (i, p) in parents.iter().enumerate() {
        if let Some(tag) = &p.tag {
            by_key.entry(tag.as_str()).or_insert(i);
        }
    }
    let regions: Vec<ParentRegion> = parents
        .iter()
        .map(|p| ParentRegion {
            original: p.original,
            region: p.region,
        })
        .collect();

    for shape in &record.shapes {
        let Some(class_id) = labels.child_class(&shape.label.name) else {
            continue;
        };
        let child = shape.geometry.bbox()?;

        let kept = match policy.strategy {
            RemapStrategy::Translate => {
                let parent = match shape.instance_key() {
                    Some(key) => by_key.get(key.as_str()).copied(),
                    None if parents.len() == 1 => Some(0),
                    None => None,
                };
                parent.and_then(|i| {
                    let local = child.translate_into(&parents[i].region);
                    local
                        .normalize(class_id, parents[i].frame, policy.validity)
                        .map(|b| crop_labels[i].insert(b))
                })
            }
            RemapStrategy::Containment => match assign_by_containment(&child, &regions) {
                Assignment::Contained { parent, local } => local
                    .normalize(class_id, parents[parent].frame, policy.validity)
                    .map(|b| crop_labels[parent].insert(b)),
                Assignment::Unassigned(original) => original
                    .normalize(class_id, record.frame, policy.validity)
                    .map(|b| plan.passthrough.insert(b)),
            },
        };

        if kept != Some(true) {
            plan.discarded += 1;
        }
    }

    plan.crops = parents
        .into_iter()
        .zip(crop_labels)
        .map(|(p, labels)| PlannedCrop {
            key: p.key,
            region: p.region,
            frame: p.frame,
            labels,
        })
        .collect();

    Ok(plan)
}

/// Give every parent a distinct crop name. A tagged child still joins the
/// first parent carrying its tag.
fn assign_crop_keys(parents: &mut [Parent]) {
    let tags: HashSet<String> = parents.iter().filter_map(|p| p.tag.clone()).collect();
    let mut used: HashSet<String> = HashSet::new();

    for parent in parents.iter_mut() {
        let base = parent
            .tag
            .clone()
            .unwrap_or_else(|| parent.ordinal.to_string());
        let taken = |key: &String, used: &HashSet<String>| {
            used.contains(key) || (tags.contains(key) && parent.tag.as_ref() != Some(key))
        };

        let mut key = base.clone();
        let mut suffix = parent.ordinal;
        while taken(&key, &used) {
            key = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        used.insert(key.clone());
        parent.key = key;
    }
}
