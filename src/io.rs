use base64::Engine;
use jwalk::WalkDir;
use log::error;
use rayon::prelude::*;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::types::{get_image_extensions_set, ImageAnnotation, IMG_FORMATS};
use crate::utils::infer_image_format;

/// Find LabelMe JSON files under `dir`, sorted by path.
pub fn find_json_files(dir: &Path, skip_dir: Option<&str>, recursive: bool) -> Vec<PathBuf> {
    find_files_with_extension(dir, "json", skip_dir, recursive)
}

/// Find files ending in `.<extension>` under `dir`, sorted by path.
///
/// Directories named `skip_dir` (previous outputs) are not entered. With
/// `recursive` false only the top level is listed.
pub fn find_files_with_extension(
    dir: &Path,
    extension: &str,
    skip_dir: Option<&str>,
    recursive: bool,
) -> Vec<PathBuf> {
    let skip_dir = skip_dir.map(str::to_string);
    let mut walker = WalkDir::new(dir).skip_hidden(false).sort(true);
    if !recursive {
        walker = walker.max_depth(1);
    }
    if let Some(skip) = skip_dir {
        walker = walker.process_read_dir(move |_, _, _, children| {
            children.retain(|entry| {
                entry.as_ref().map_or(true, |e| {
                    !(e.file_type().is_dir() && e.file_name().to_str() == Some(skip.as_str()))
                })
            });
        });
    }

    let mut files: Vec<PathBuf> = walker
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_type().is_file() && e.path().extension().is_some_and(|ext| ext == extension)
        })
        .map(|e| e.path())
        .collect();
    files.sort();
    files
}

/// Read and parse a single JSON file into an ImageAnnotation struct using streaming
pub fn read_and_parse_json(path: &Path) -> Option<ImageAnnotation> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            error!("Failed to open JSON file ({}): {:?}", path.display(), e);
            return None;
        }
    };

    match serde_json::from_reader(std::io::BufReader::new(file)) {
        Ok(annotation) => Some(annotation),
        Err(e) => {
            error!("Failed to parse JSON ({}): {}", path.display(), e);
            None
        }
    }
}

/// Parse all files in parallel, dropping those that fail. Input order is kept.
pub fn load_annotations(paths: Vec<PathBuf>) -> Vec<(PathBuf, ImageAnnotation)> {
    paths
        .into_par_iter()
        .filter_map(|path| read_and_parse_json(&path).map(|annotation| (path, annotation)))
        .collect()
}

/// Locate the image belonging to a JSON file.
///
/// Tries `imagePath` relative to the JSON file (or to `image_dir`), then the
/// JSON file stem with each known image extension.
pub fn resolve_image_path(
    json_path: &Path,
    annotation: &ImageAnnotation,
    image_dir: Option<&Path>,
) -> Option<PathBuf> {
    let base = image_dir
        .map(Path::to_path_buf)
        .or_else(|| json_path.parent().map(Path::to_path_buf))
        .unwrap_or_default();

    if !annotation.image_path.is_empty() {
        let by_record = base.join(&annotation.image_path);
        if by_record.is_file() {
            return Some(by_record);
        }
        if let Some(name) = Path::new(&annotation.image_path).file_name() {
            let by_name = base.join(name);
            if by_name.is_file() {
                return Some(by_name);
            }
        }
    }

    let stem = json_path.file_stem()?.to_string_lossy();
    IMG_FORMATS
        .iter()
        .map(|ext| base.join(format!("{}.{}", stem, ext)))
        .find(|candidate| candidate.is_file())
}

/// Output base name for a JSON file: its sanitized stem, prefixed with the
/// parent folder name when `prefix_folder` is set.
pub fn output_stem(json_path: &Path, prefix_folder: bool) -> String {
    let stem = json_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match json_path
        .parent()
        .and_then(|p| p.file_name())
        .filter(|_| prefix_folder)
    {
        Some(folder) => format!("{}_{}", folder.to_string_lossy(), stem),
        None => stem,
    };
    sanitize_filename::sanitize(name)
}

/// Put the image for an annotation into `images_dir` as `<stem>.<ext>`.
///
/// Copies the file found by [`resolve_image_path`], else decodes embedded
/// `imageData`. Returns the written path, or `None` when neither exists.
pub fn export_image(
    source: Option<&Path>,
    annotation: &ImageAnnotation,
    images_dir: &Path,
    stem: &str,
) -> std::io::Result<Option<PathBuf>> {
    if let Some(source) = source {
        let extension = source
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .filter(|e| get_image_extensions_set().contains(e))
            .unwrap_or_else(|| "jpg".to_string());
        let dest = images_dir.join(format!("{}.{}", stem, extension));
        fs::copy(source, &dest)?;
        return Ok(Some(dest));
    }

    match annotation.image_data.as_deref() {
        Some(data) if !data.is_empty() => {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(data)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            let extension = infer_image_format(&bytes).unwrap_or("png");
            let dest = images_dir.join(format!("{}.{}", stem, extension));
            let mut file = File::create(&dest)?;
            file.write_all(&bytes)?;
            Ok(Some(dest))
        }
        _ => Ok(None),
    }
}

/// Write a label file in one go.
pub fn write_label_file(path: &Path, contents: &str) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(contents.as_bytes())?;
    writer.flush()
}
