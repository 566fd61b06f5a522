use indicatif::{ProgressBar, ProgressStyle};
use log::warn;
use std::fs;
use std::path::{Path, PathBuf};

const MAGIC_PREFIXES: [(&[u8], &str); 5] = [
    (&[0xFF, 0xD8, 0xFF], "jpg"),
    (&[0x89, b'P', b'N', b'G'], "png"),
    (b"BM", "bmp"),
    (b"GIF", "gif"),
    (b"RIFF", "webp"),
];

/// Guess the file extension of embedded image bytes from their magic number.
pub fn infer_image_format(image_bytes: &[u8]) -> Option<&'static str> {
    let (_, extension) = MAGIC_PREFIXES
        .iter()
        .find(|(magic, _)| image_bytes.starts_with(magic))?;
    // RIFF is a container; only WEBP payloads are images.
    if *extension == "webp" && image_bytes.get(8..12) != Some(b"WEBP".as_slice()) {
        return None;
    }
    Some(*extension)
}

/// Progress bar for a batch of `len` files, tagged with `label`.
pub fn create_progress_bar(len: u64, label: &str) -> ProgressBar {
    let template = format!(
        "{{spinner:.green}} [{}] [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} ({{eta}})",
        label
    );
    let style = ProgressStyle::default_bar()
        .template(&template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    ProgressBar::new(len).with_style(style)
}

/// Create `path` as an empty directory, wiping any previous dataset there.
pub fn create_output_directory(path: &Path) -> std::io::Result<PathBuf> {
    if path.exists() {
        warn!("Replacing existing output directory {}", path.display());
        fs::remove_dir_all(path)?;
    }
    fs::create_dir_all(path)?;
    Ok(path.to_path_buf())
}
