use atlas_graph::{GraphLanguage, SourceFile};
use ignore::WalkBuilder;
use std::path::Path;

/// Directories never worth parsing, even when not gitignored
const IGNORED_SCOPES: &[&str] = &["target", "node_modules", "dist", "build", "__pycache__"];

/// Files above this size are skipped
const MAX_FILE_SIZE_BYTES: u64 = 1_048_576;

/// Collect the parseable source files under `root` (.gitignore aware)
///
/// Paths are made relative to `root` with `/` separators so graph ids do not depend on
/// where the repository is checked out.
pub fn collect_sources(root: &Path) -> Vec<SourceFile> {
    let mut files = Vec::new();

    let scope_root = root.to_path_buf();
    let mut builder = WalkBuilder::new(root);
    builder
        .hidden(true)
        .git_ignore(true)
        .git_global(true)
        .git_exclude(true);
    builder.filter_entry(move |entry| !is_ignored_scope(entry.path(), &scope_root));

    for result in builder.build() {
        match result {
            Ok(entry) => {
                let Some(file_type) = entry.file_type() else {
                    continue;
                };
                if !file_type.is_file() {
                    continue;
                }

                let path = entry.path();
                if GraphLanguage::from_path(path).is_none() {
                    continue;
                }
                if let Ok(meta) = entry.metadata() {
                    if meta.len() > MAX_FILE_SIZE_BYTES {
                        log::debug!(
                            "Skipping large file {} ({} bytes > {})",
                            path.display(),
                            meta.len(),
                            MAX_FILE_SIZE_BYTES
                        );
                        continue;
                    }
                }

                let bytes = match std::fs::read(path) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        log::warn!("Failed to read {}: {e}", path.display());
                        continue;
                    }
                };
                files.push(SourceFile::detect(relative_path(path, root), bytes));
            }
            Err(e) => log::warn!("Failed to read entry: {e}"),
        }
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    log::info!("Found {} source files under {}", files.len(), root.display());
    files
}

fn relative_path(path: &Path, root: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn is_ignored_scope(path: &Path, root: &Path) -> bool {
    if let Ok(relative) = path.strip_prefix(root) {
        for component in relative.components() {
            if let std::path::Component::Normal(name) = component {
                let lowered = name.to_string_lossy().to_lowercase();
                if IGNORED_SCOPES.iter().any(|ignored| ignored == &lowered) {
                    return true;
                }
            }
        }
    }
    false
}
