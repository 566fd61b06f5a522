use log::{info, warn};
use rayon::prelude::*;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::Args;
use crate::conversion::{convert_to_yolo_format, ClassResolver};
use crate::dataset::{split_annotations, Split};
use crate::io::{
    export_image, find_json_files, load_annotations, output_stem, resolve_image_path,
    write_label_file,
};
use crate::types::{ImageAnnotation, ProcessingStats};
use crate::utils::{create_output_directory, create_progress_bar};

/// Name of the dataset directory created inside the JSON directory.
pub const YOLO_DATASET_DIR: &str = "YOLODataset";

/// Paths to the output directories of a YOLO dataset
#[derive(Debug, Clone)]
pub struct OutputDirs {
    pub root: PathBuf,
    pub images: PathBuf,
    pub labels: PathBuf,
}

impl OutputDirs {
    pub fn images_dir(&self, split: Split) -> PathBuf {
        self.images.join(split.name())
    }

    pub fn labels_dir(&self, split: Split) -> PathBuf {
        self.labels.join(split.name())
    }
}

/// Create `images/<split>` and `labels/<split>` under a fresh `root`.
pub fn setup_output_directories(root: &Path, with_test: bool) -> std::io::Result<OutputDirs> {
    let root = create_output_directory(root)?;
    let dirs = OutputDirs {
        images: root.join("images"),
        labels: root.join("labels"),
        root,
    };

    let mut splits = vec![Split::Train, Split::Val];
    if with_test {
        splits.push(Split::Test);
    }
    for split in splits {
        fs::create_dir_all(dirs.images_dir(split))?;
        fs::create_dir_all(dirs.labels_dir(split))?;
    }
    Ok(dirs)
}

/// Main dataset processing pipeline
pub fn process_dataset(args: &Args) -> Result<ProcessingStats, Box<dyn std::error::Error>> {
    let dirname = PathBuf::from(&args.json_dir);
    if !dirname.is_dir() {
        return Err(format!("The specified json_dir does not exist: {}", args.json_dir).into());
    }

    let json_files = find_json_files(&dirname, Some(YOLO_DATASET_DIR), true);
    info!("Found {} JSON files.", json_files.len());
    let annotations = load_annotations(json_files);
    info!("Read and parsed {} files.", annotations.len());

    let resolver = ClassResolver::from_args(args, &annotations);
    let split_data = split_annotations(annotations, args.val_size, args.test_size, args.seed);
    let output_dirs =
        setup_output_directories(&dirname.join(YOLO_DATASET_DIR), args.test_size > 0.0)?;

    let mut stats = ProcessingStats::new();
    for (split, items) in split_data.into_parts() {
        if items.is_empty() {
            continue;
        }
        let split_stats = process_split(&items, split, &output_dirs, &resolver, args);
        stats = stats.merge(split_stats);
    }

    info!("Creating dataset.yaml file...");
    create_dataset_yaml(&output_dirs.root, &resolver.names(), args.test_size > 0.0)
        .map_err(|e| format!("Failed to create dataset.yaml: {}", e))?;

    stats.print_summary();
    Ok(stats)
}

/// Convert one split in parallel.
pub fn process_split(
    items: &[(PathBuf, ImageAnnotation)],
    split: Split,
    output_dirs: &OutputDirs,
    resolver: &ClassResolver,
    args: &Args,
) -> ProcessingStats {
    let pb = create_progress_bar(items.len() as u64, split.name());
    let images_dir = output_dirs.images_dir(split);
    let labels_dir = output_dirs.labels_dir(split);

    let stats = items
        .par_iter()
        .map(|(json_path, annotation)| {
            let stats = process_file(
                json_path,
                annotation,
                &images_dir,
                &labels_dir,
                resolver,
                args,
            );
            pb.inc(1);
            stats
        })
        .reduce(ProcessingStats::new, ProcessingStats::merge);

    pb.finish_with_message(format!("{} processing complete", split));
    stats
}

fn process_file(
    json_path: &Path,
    annotation: &ImageAnnotation,
    images_dir: &Path,
    labels_dir: &Path,
    resolver: &ClassResolver,
    args: &Args,
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
    for rejected in &record.rejected {
        warn!(
            "{}: shape #{} `{}` ignored: {}",
            json_path.display(),
            rejected.index,
            rejected.label,
            rejected.error
        );
    }
    stats.shapes_rejected = record.rejected.len();

    let stem = output_stem(json_path, args.prefix_folder);
    let source = resolve_image_path(json_path, annotation, None);
    match export_image(source.as_deref(), annotation, images_dir, &stem) {
        Ok(Some(_)) => {}
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
    }

    let converted = convert_to_yolo_format(&record, args.output_format, resolver);
    let label_path = labels_dir.join(format!("{}.txt", stem));
    if let Err(e) = write_label_file(&label_path, &converted.contents) {
        warn!("Failed to write {}: {}", label_path.display(), e);
        stats.failed_conversions = 1;
        return stats;
    }

    stats.successful_conversions = 1;
    stats.shapes_written = converted.written;
    stats.shapes_discarded = converted.discarded;
    stats
}

/// Write `dataset.yaml` describing the dataset rooted at `root`.
pub fn create_dataset_yaml(
    root: &Path,
    names: &[(u32, String)],
    with_test: bool,
) -> std::io::Result<()> {
    let mut dataset_yaml = BufWriter::new(File::create(root.join("dataset.yaml"))?);
    let absolute_path = fs::canonicalize(root)?;
    let mut yaml_content = format!(
        "path: {}\ntrain: images/train\nval: images/val\n",
        absolute_path.to_string_lossy()
    );
    if with_test {
        yaml_content.push_str("test: images/test\n");
    } else {
        yaml_content.push_str("test:\n");
    }
    yaml_content.push_str("\nnames:\n");
    for (id, label) in names {
        yaml_content.push_str(&format!("    {}: {}\n", id, label));
    }
    dataset_yaml.write_all(yaml_content.as_bytes())?;
    dataset_yaml.flush()
}
