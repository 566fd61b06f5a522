//! COCO dataset processing module
//!
//! Converts LabelMe annotations to COCO instance files, one per split.
//! Files are visited in split order so image and annotation ids are stable
//! for a given seed.

use log::{info, warn};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::coco::{CocoFile, CocoWriter, InstanceGeometry};
use crate::config::CocoArgs;
use crate::conversion::{group_instances, ClassResolver};
use crate::dataset::{split_annotations, Split};
use crate::io::{
    export_image, find_json_files, load_annotations, output_stem, resolve_image_path,
};
use crate::types::{ImageAnnotation, ProcessingStats};
use crate::utils::{create_output_directory, create_progress_bar};

/// Name of the dataset directory created inside the JSON directory.
pub const COCO_DATASET_DIR: &str = "COCODataset";

/// Paths to the output directories of a COCO dataset
#[derive(Debug, Clone)]
pub struct CocoOutputDirs {
    pub annotations_dir: PathBuf,
    pub images_dir: PathBuf,
}

impl CocoOutputDirs {
    pub fn split_images_dir(&self, split: Split) -> PathBuf {
        self.images_dir.join(split.name())
    }

    pub fn annotation_file(&self, split: Split) -> PathBuf {
        self.annotations_dir
            .join(format!("instances_{}.json", split.name()))
    }
}

/// Create `annotations/` and `images/<split>` under a fresh `root`.
pub fn setup_coco_output_directories(
    root: &Path,
    with_test: bool,
) -> std::io::Result<CocoOutputDirs> {
    let root = create_output_directory(root)?;
    let dirs = CocoOutputDirs {
        annotations_dir: root.join("annotations"),
        images_dir: root.join("images"),
    };
    fs::create_dir_all(&dirs.annotations_dir)?;

    let mut splits = vec![Split::Train, Split::Val];
    if with_test {
        splits.push(Split::Test);
    }
    for split in splits {
        fs::create_dir_all(dirs.split_images_dir(split))?;
    }
    Ok(dirs)
}

/// Category id written to COCO for a resolved class.
///
/// Label classes are shifted by one so ids start at 1; group-id classes get
/// their `group_id` back.
pub fn category_id(resolver: &ClassResolver, class_id: u32) -> Option<u32> {
    match resolver {
        ClassResolver::Labels { .. } => class_id.checked_add(1),
        ClassResolver::GroupId { offset, .. } => u32::try_from(class_id as i64 + offset).ok(),
    }
}

/// Main COCO dataset processing pipeline
pub fn process_coco_dataset(
    args: &CocoArgs,
) -> Result<ProcessingStats, Box<dyn std::error::Error>> {
    let common = &args.common;
    let dirname = PathBuf::from(&common.json_dir);
    if !dirname.is_dir() {
        return Err(format!("The specified json_dir does not exist: {}", common.json_dir).into());
    }

    let json_files = find_json_files(&dirname, Some(COCO_DATASET_DIR), true);
    info!("Found {} JSON files.", json_files.len());
    let annotations = load_annotations(json_files);
    info!("Read and parsed {} files.", annotations.len());

    let resolver = ClassResolver::from_args(common, &annotations);
    let with_test = common.test_size > 0.0;
    let split_data = split_annotations(annotations, common.val_size, common.test_size, common.seed);
    let output_dirs = setup_coco_output_directories(&dirname.join(COCO_DATASET_DIR), with_test)?;

    let mut writer = CocoWriter::new(args.image_id_scheme());
    for (class_id, name) in resolver.names() {
        if let Some(id) = category_id(&resolver, class_id) {
            writer.add_category(id, &name);
        }
    }

    let mut stats = ProcessingStats::new();
    for (split, items) in split_data.into_parts() {
        if split == Split::Test && !with_test {
            continue;
        }
        let pb = create_progress_bar(items.len() as u64, split.name());
        let images_dir = output_dirs.split_images_dir(split);
        for (json_path, annotation) in &items {
            let file_stats = add_annotation(
                &mut writer,
                json_path,
                annotation,
                &images_dir,
                &resolver,
                common.prefix_folder,
            );
            stats = stats.merge(file_stats);
            pb.inc(1);
        }
        pb.finish_with_message(format!("{} processing complete", split));

        let coco = writer.finish_split();
        write_coco_file(&output_dirs.annotation_file(split), &coco)?;
        info!(
            "Wrote {} images and {} annotations to {}",
            coco.images.len(),
            coco.annotations.len(),
            output_dirs.annotation_file(split).display()
        );
    }

    stats.print_summary();
    Ok(stats)
}

fn add_annotation(
    writer: &mut CocoWriter,
    json_path: &Path,
    annotation: &ImageAnnotation,
    images_dir: &Path,
    resolver: &ClassResolver,
    prefix_folder: bool,
) -> ProcessingStats {
    let mut stats = ProcessingStats {
        total_files_processed: 1,
        ..ProcessingStats::default()
    };

    let record = match annotation.validate() {
        Ok(record) => record,
        Err(e) => {
            warn!("Skipping {}: {}", json_path.display(), e);
            stats.failed_conversions = 1;
            return stats;
        }
    };
    stats.shapes_rejected = record.rejected.len();

    let stem = output_stem(json_path, prefix_folder);
    let source = resolve_image_path(json_path, annotation, None);
    let dest = match export_image(source.as_deref(), annotation, images_dir, &stem) {
        Ok(Some(dest)) => dest,
        Ok(None) => {
            warn!("No image found for {}", json_path.display());
            stats.skipped_missing_image = 1;
            return stats;
        }
        Err(e) => {
            warn!("Failed to export image for {}: {}", json_path.display(), e);
            stats.failed_conversions = 1;
            return stats;
        }
    };

    let mut instances = Vec::new();
    for (class_id, parts) in group_instances(&record, resolver) {
        match category_id(resolver, class_id) {
            Some(category_id) => instances.push(InstanceGeometry { category_id, parts }),
            None => stats.shapes_discarded += parts.len(),
        }
    }

    let file_name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| stem.clone());
    match writer.add_image(
        file_name,
        record.frame.width(),
        record.frame.height(),
        &instances,
    ) {
        Ok((_, dropped)) => {
            stats.successful_conversions = 1;
            stats.shapes_written = instances.len() - dropped;
            stats.shapes_discarded += dropped;
        }
        Err(e) => {
            warn!("Skipping {}: {}", json_path.display(), e);
            stats.failed_conversions = 1;
            if let Err(e) = fs::remove_file(&dest) {
                warn!("Failed to remove {}: {}", dest.display(), e);
            }
        }
    }
    stats
}

/// Serialize a COCO file as pretty JSON.
pub fn write_coco_file(path: &Path, coco: &CocoFile) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, coco)?;
    writer.flush()
}
