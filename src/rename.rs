use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// How a file name is rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameRule {
    /// Drop the first `chars` characters of the name.
    StripPrefix { chars: usize },
    /// Replace the extension with `to`.
    ChangeExtension { to: String },
}

/// New name for `name` under `rule`, or `None` when the file is not
/// affected: its extension is not `extension` (compared case-insensitively),
/// or the rule would leave it unchanged or empty.
pub fn renamed_file_name(name: &str, extension: &str, rule: &RenameRule) -> Option<String> {
    let extension = extension.trim_start_matches('.');
    let (stem, ext) = name.rsplit_once('.')?;
    if !ext.eq_ignore_ascii_case(extension) {
        return None;
    }

    let renamed = match rule {
        RenameRule::StripPrefix { chars } => name.chars().skip(*chars).collect::<String>(),
        RenameRule::ChangeExtension { to } => {
            format!("{}.{}", stem, to.trim_start_matches('.'))
        }
    };

    if renamed.is_empty() || renamed.starts_with('.') || renamed == name {
        None
    } else {
        Some(renamed)
    }
}

/// Rename the regular files directly inside `dir`.
///
/// A rename onto an existing file is skipped with a warning. Returns the
/// `(from, to)` pairs actually renamed, in name order.
pub fn rename_files(
    dir: &Path,
    extension: &str,
    rule: &RenameRule,
) -> std::io::Result<Vec<(PathBuf, PathBuf)>> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    entries.sort();

    let mut renamed = Vec::new();
    for from in entries {
        let Some(name) = from.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(new_name) = renamed_file_name(name, extension, rule) else {
            continue;
        };
        let to = dir.join(new_name);
        if to.exists() {
            warn!(
                "Not renaming {}: {} already exists",
                from.display(),
                to.display()
            );
            continue;
        }
        fs::rename(&from, &to)?;
        info!("Renamed: {} -> {}", from.display(), to.display());
        renamed.push((from, to));
    }
    Ok(renamed)
}
