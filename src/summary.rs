use dashmap::DashMap;
use log::{error, info};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::CountFormat;
use crate::io::{find_files_with_extension, find_json_files, read_and_parse_json};
use crate::types::ShapeLabel;

/// Occurrences of each label name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelCounts {
    pub files: usize,
    pub counts: BTreeMap<String, usize>,
}

impl LabelCounts {
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn print_summary(&self) {
        info!("=== Label Counts ({} files) ===", self.files);
        for (label, count) in &self.counts {
            info!("{}: {}", label, count);
        }
        info!("Total shapes: {}", self.total());
    }
}

/// Count label occurrences, keyed by lowercased name, in the given LabelMe
/// files. Unreadable files are logged and left out of `files`.
pub fn count_labels(json_files: &[PathBuf]) -> LabelCounts {
    tally(json_files, |path| {
        read_and_parse_json(path).map(|annotation| {
            annotation
                .shapes
                .iter()
                .map(|shape| ShapeLabel::parse(&shape.label).name)
                .collect()
        })
    })
}

/// Count `<object><name>` occurrences in Pascal VOC XML files. Names are
/// kept as written. Unreadable files are logged and left out of `files`.
pub fn count_voc_labels(xml_files: &[PathBuf]) -> LabelCounts {
    tally(xml_files, |path| match read_voc_object_names(path) {
        Ok(names) => Some(names),
        Err(e) => {
            error!("Failed to read VOC file ({}): {}", path.display(), e);
            None
        }
    })
}

/// Names of the top-level `<object>` elements of one VOC annotation.
pub fn read_voc_object_names(path: &Path) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let text = fs::read_to_string(path)?;
    let doc = roxmltree::Document::parse(&text)?;
    let names = doc
        .root_element()
        .children()
        .filter(|node| node.has_tag_name("object"))
        .filter_map(|object| object.children().find(|n| n.has_tag_name("name")))
        .filter_map(|name| name.text())
        .map(|text| text.trim().to_string())
        .collect();
    Ok(names)
}

fn tally<F>(files: &[PathBuf], read_names: F) -> LabelCounts
where
    F: Fn(&Path) -> Option<Vec<String>> + Sync,
{
    let counts: DashMap<String, usize> = DashMap::new();

    let files = files
        .par_iter()
        .filter_map(|path| read_names(path))
        .map(|names| {
            for name in names {
                *counts.entry(name).or_insert(0) += 1;
            }
        })
        .count();

    LabelCounts {
        files,
        counts: counts.into_iter().collect(),
    }
}

/// Count labels of all annotation files under `dir` and log the result.
///
/// LabelMe JSON is searched recursively; VOC XML only at the top level, as
/// in a VOC `Annotations/` folder.
pub fn count_labels_in_dir(
    dir: &Path,
    format: CountFormat,
) -> Result<LabelCounts, Box<dyn std::error::Error>> {
    if !dir.is_dir() {
        return Err(format!("The specified directory does not exist: {}", dir.display()).into());
    }
    let counts = match format {
        CountFormat::Labelme => count_labels(&find_json_files(dir, None, true)),
        CountFormat::Voc => count_voc_labels(&find_files_with_extension(dir, "xml", None, false)),
    };
    counts.print_summary();
    Ok(counts)
}
