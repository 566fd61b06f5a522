use log::{info, warn};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::CropArgs;
use crate::crop::{plan_crops, CropLabels, CropPlan, RemapPolicy};
use crate::geometry::ImageFrame;
use crate::io::{find_json_files, read_and_parse_json, resolve_image_path, write_label_file};
use crate::types::ProcessingStats;
use crate::utils::create_progress_bar;

/// Crop every annotated image in `args.json_dir` around its parent shapes.
///
/// Each crop is saved as `<image folder>_<image stem>_<key>.<ext>` in the
/// output directory with a YOLO label file of the same name. Children passed
/// through under the containment strategy go to `<image folder>_<image
/// stem>.txt` next to a copy of the source image.
pub fn process_crop_dataset(
    args: &CropArgs,
) -> Result<ProcessingStats, Box<dyn std::error::Error>> {
    if !args.json_dir.is_dir() {
        return Err(format!(
            "The specified json_dir does not exist: {}",
            args.json_dir.display()
        )
        .into());
    }
    let policy = args.remap_policy()?;
    let folder = image_folder_name(&args.image_dir);
    let labels = CropLabels::new(&args.parent_label, &args.child_labels);
    fs::create_dir_all(&args.output_dir)?;

    let json_files = find_json_files(&args.json_dir, None, false);
    info!("Found {} JSON files.", json_files.len());

    let pb = create_progress_bar(json_files.len() as u64, "Crop");
    let stats = json_files
        .par_iter()
        .map(|json_path| {
            let stats = crop_file(json_path, args, &folder, &labels, &policy);
            pb.inc(1);
            stats
        })
        .reduce(ProcessingStats::new, ProcessingStats::merge);
    pb.finish_with_message("Crop processing complete");

    stats.print_summary();
    Ok(stats)
}

fn crop_file(
    json_path: &Path,
    args: &CropArgs,
    folder: &str,
    labels: &CropLabels,
    policy: &RemapPolicy,
) -> ProcessingStats {
    let mut stats = ProcessingStats {
        total_files_processed: 1,
        ..ProcessingStats::default()
    };

    let Some(annotation) = read_and_parse_json(json_path) else {
        stats.failed_conversions = 1;
        return stats;
    };
    let planned = annotation.validate().and_then(|record| {
        stats.shapes_rejected = record.rejected.len();
        plan_crops(&record, labels, policy).map(|plan| (record.frame, plan))
    });
    let (record_frame, plan) = match planned {
        Ok(planned) => planned,
        Err(e) => {
            warn!("Skipping {}: {}", json_path.display(), e);
            stats.failed_conversions = 1;
            return stats;
        }
    };
    stats.shapes_discarded = plan.discarded;

    if plan.crops.is_empty() && plan.passthrough.is_empty() {
        stats.successful_conversions = 1;
        return stats;
    }

    let Some(image_path) = resolve_image_path(json_path, &annotation, Some(&args.image_dir)) else {
        warn!("No image found for {}", json_path.display());
        stats.skipped_missing_image = 1;
        return stats;
    };

    let stem = image_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let base = sanitize_filename::sanitize(format!("{}_{}", folder, stem));
    match write_crops(&image_path, record_frame, &plan, &args.output_dir, &base) {
        Ok(written) => {
            stats.successful_conversions = 1;
            stats.shapes_written = written;
        }
        Err(e) => {
            warn!("Failed to crop {}: {}", image_path.display(), e);
            stats.failed_conversions = 1;
        }
    }
    stats
}

/// Cut the planned crops out of the image and write them with their labels.
/// Returns the number of label lines written.
///
/// Fails without writing anything when the decoded image does not have the
/// size `frame` the plan was made for.
pub fn write_crops(
    image_path: &Path,
    frame: ImageFrame,
    plan: &CropPlan,
    output_dir: &Path,
    base: &str,
) -> Result<usize, Box<dyn std::error::Error>> {
    let extension = image_path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_else(|| "jpg".to_string());
    let mut written = 0;

    let img = image::open(image_path)?;
    if (img.width(), img.height()) != (frame.width(), frame.height()) {
        return Err(format!(
            "image is {}x{} but its annotation says {}x{}",
            img.width(),
            img.height(),
            frame.width(),
            frame.height()
        )
        .into());
    }

    for crop in &plan.crops {
        let (x, y, width, height) = crop.region.pixel_rect()?;
        let name = sanitize_filename::sanitize(format!("{}_{}", base, crop.key));
        let cropped = img.crop_imm(x, y, width, height);
        cropped.save(output_path(output_dir, &name, &extension))?;
        write_label_file(&output_path(output_dir, &name, "txt"), &crop.labels.to_lines())?;
        written += crop.labels.len();
    }

    if !plan.passthrough.is_empty() {
        fs::copy(image_path, output_path(output_dir, base, &extension))?;
        write_label_file(&output_path(output_dir, base, "txt"), &plan.passthrough.to_lines())?;
        written += plan.passthrough.len();
    }

    Ok(written)
}

/// Last component of the image directory, used to prefix output names.
fn image_folder_name(image_dir: &Path) -> String {
    fs::canonicalize(image_dir)
        .ok()
        .as_deref()
        .unwrap_or(image_dir)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn output_path(dir: &Path, name: &str, extension: &str) -> PathBuf {
    dir.join(format!("{}.{}", name, extension))
}
