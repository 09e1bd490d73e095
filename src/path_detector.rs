use std::path::{Path, PathBuf};

/// Locate the goodbyedpi binary.
///
/// Absolute paths are taken as-is. Relative ones are tried against the
/// working directory, then next to our own executable. If nothing exists the
/// configured path comes back unchanged and the spawn reports the failure.
pub fn resolve_executable(configured: &str) -> PathBuf {
    let path = Path::new(configured);
    if path.is_absolute() {
        return path.to_path_buf();
    }

    let mut candidates = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd.join(path));
    }
    if let Some(dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)) {
        candidates.push(dir.join(path));
    }

    for candidate in candidates {
        if candidate.is_file() {
            tracing::info!("Found goodbyedpi at: {}", candidate.display());
            return candidate;
        }
    }

    tracing::warn!("Could not find goodbyedpi executable: {}", configured);
    path.to_path_buf()
}
