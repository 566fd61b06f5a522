use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::config::{Args, ClassSource, Format};
use crate::geometry::{Point, Validity};
use crate::merge::merge_segments;
use crate::types::{AnnotationRecord, ImageAnnotation, ShapeLabel, ShapeRecord};
use crate::yolo::{YoloLabelSet, YoloSegment};

/// Maps shapes to class ids.
#[derive(Debug, Clone)]
pub enum ClassResolver {
    /// Class is the label's position in a fixed list.
    Labels {
        ids: HashMap<String, u32>,
        skip: BTreeSet<String>,
    },
    /// Class is `group_id - offset`; `names` records a label per class.
    GroupId {
        offset: i64,
        names: BTreeMap<u32, String>,
        skip: BTreeSet<String>,
    },
}

impl ClassResolver {
    /// Build the resolver for a whole dataset before any file is converted,
    /// so class ids do not depend on processing order.
    ///
    /// Without an explicit label list every label name found is used, in
    /// alphabetical order.
    pub fn from_args(args: &Args, annotations: &[(std::path::PathBuf, ImageAnnotation)]) -> Self {
        let skip: BTreeSet<String> = args.skip_labels.iter().map(|l| normalize_name(l)).collect();
        let shapes = annotations.iter().flat_map(|(_, a)| a.shapes.iter());

        match args.class_source {
            ClassSource::Label => {
                let names: Vec<String> = if args.label_list.is_empty() {
                    shapes
                        .map(|s| ShapeLabel::parse(&s.label).name)
                        .filter(|n| !skip.contains(n))
                        .collect::<BTreeSet<_>>()
                        .into_iter()
                        .collect()
                } else {
                    args.label_list.iter().map(|l| normalize_name(l)).collect()
                };
                let mut ids = HashMap::new();
                for name in names {
                    let next = ids.len() as u32;
                    ids.entry(name).or_insert(next);
                }
                ClassResolver::Labels { ids, skip }
            }
            ClassSource::GroupId => {
                let mut names = BTreeMap::new();
                for shape in shapes {
                    let name = ShapeLabel::parse(&shape.label).name;
                    if skip.contains(&name) {
                        continue;
                    }
                    let class = shape
                        .group_id
                        .and_then(|g| class_from_group(g, args.group_id_offset));
                    if let Some(class) = class {
                        names.entry(class).or_insert(name);
                    }
                }
                ClassResolver::GroupId {
                    offset: args.group_id_offset,
                    names,
                    skip,
                }
            }
        }
    }

    pub fn resolve(&self, shape: &ShapeRecord) -> Option<u32> {
        match self {
            ClassResolver::Labels { ids, skip } => {
                if skip.contains(&shape.label.name) {
                    return None;
                }
                ids.get(&shape.label.name).copied()
            }
            ClassResolver::GroupId { offset, skip, .. } => {
                if skip.contains(&shape.label.name) {
                    return None;
                }
                shape.group_id.and_then(|g| class_from_group(g, *offset))
            }
        }
    }

    /// Class names ordered by class id.
    pub fn names(&self) -> Vec<(u32, String)> {
        match self {
            ClassResolver::Labels { ids, .. } => {
                let mut names: Vec<(u32, String)> =
                    ids.iter().map(|(name, &id)| (id, name.clone())).collect();
                names.sort();
                names
            }
            ClassResolver::GroupId { names, .. } => {
                names.iter().map(|(&id, name)| (id, name.clone())).collect()
            }
        }
    }

    /// Whether shapes sharing an instance key form one object. Only when
    /// group ids are not already spent on classes.
    fn groups_instances(&self) -> bool {
        matches!(self, ClassResolver::Labels { .. })
    }
}

fn class_from_group(group_id: i64, offset: i64) -> Option<u32> {
    u32::try_from(group_id - offset).ok()
}

fn normalize_name(label: &str) -> String {
    label.trim().to_lowercase()
}

/// Result of converting one record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConvertedLabels {
    pub contents: String,
    pub written: usize,
    /// Shapes dropped as degenerate, duplicate, or unmergeable.
    pub discarded: usize,
}

/// Convert a validated record to YOLO label lines
pub fn convert_to_yolo_format(
    record: &AnnotationRecord,
    format: Format,
    resolver: &ClassResolver,
) -> ConvertedLabels {
    match format {
        Format::Bbox => convert_boxes(record, resolver),
        Format::Polygon => convert_segments(record, resolver),
    }
}

fn convert_boxes(record: &AnnotationRecord, resolver: &ClassResolver) -> ConvertedLabels {
    let mut set = YoloLabelSet::new();
    let mut discarded = 0;

    for shape in &record.shapes {
        let Some(class_id) = resolver.resolve(shape) else {
            continue;
        };
        let normalized = shape
            .geometry
            .bbox()
            .ok()
            .and_then(|b| b.normalize(class_id, record.frame, Validity::Lenient));
        if !normalized.is_some_and(|b| set.insert(b)) {
            discarded += 1;
        }
    }

    ConvertedLabels {
        contents: set.to_lines(),
        written: set.len(),
        discarded,
    }
}

/// Outlines of the resolved shapes of a record, grouped per object.
///
/// Shapes of one class sharing an instance key form one object when class
/// ids come from labels; otherwise every shape is its own object. Objects are
/// in order of first appearance, parts in annotation order.
pub fn group_instances(
    record: &AnnotationRecord,
    resolver: &ClassResolver,
) -> Vec<(u32, Vec<Vec<Point>>)> {
    let mut instances: Vec<(u32, Vec<Vec<Point>>)> = Vec::new();
    let mut by_key: HashMap<(u32, String), usize> = HashMap::new();

    for shape in &record.shapes {
        let Some(class_id) = resolver.resolve(shape) else {
            continue;
        };
        let outline = shape.geometry.outline();
        let key = shape
            .instance_key()
            .filter(|_| resolver.groups_instances());

        match key {
            Some(key) => match by_key.get(&(class_id, key.clone())) {
                Some(&i) => instances[i].1.push(outline),
                None => {
                    by_key.insert((class_id, key), instances.len());
                    instances.push((class_id, vec![outline]));
                }
            },
            None => instances.push((class_id, vec![outline])),
        }
    }
    instances
}

fn convert_segments(record: &AnnotationRecord, resolver: &ClassResolver) -> ConvertedLabels {
    let instances = group_instances(record, resolver);

    let mut contents = String::with_capacity(instances.len() * 128);
    let mut written = 0;
    let mut discarded = 0;
    for (class_id, parts) in instances {
        match merge_segments(&parts) {
            Ok(points) => {
                let segment = YoloSegment::from_pixels(class_id, &points, record.frame);
                contents.push_str(&segment.to_string());
                contents.push('\n');
                written += 1;
            }
            Err(e) => {
                log::debug!("Dropping instance of class {}: {}", class_id, e);
                discarded += parts.len();
            }
        }
    }

    ConvertedLabels {
        contents,
        written,
        discarded,
    }
}
