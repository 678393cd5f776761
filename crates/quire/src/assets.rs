use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{IoContext, QuireError, Result};

/// Mirrors every file under `static_dir` into `output_dir`, overwriting
/// what is there. A missing static directory is not an error; files that
/// fail to copy are logged and skipped. Returns the number copied.
pub fn copy_static(static_dir: &Path, output_dir: &Path) -> usize {
    if !static_dir.is_dir() {
        debug!("No static directory at {}", static_dir.display());
        return 0;
    }

    let mut copied = 0;
    for entry in WalkDir::new(static_dir).min_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                warn!("Directory walk error in {}: {error}", static_dir.display());
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(static_dir) else {
            continue;
        };
        match copy_file(entry.path(), &output_dir.join(relative)) {
            Ok(()) => copied += 1,
            Err(error) => warn!("Skipping static file {}: {error}", entry.path().display()),
        }
    }

    debug!("Copied {copied} static files");
    copied
}

fn copy_file(source: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).io_context("creating", parent)?;
    }
    fs::copy(source, dest).io_context("copying", source)?;
    Ok(())
}

fn collect_files_with_extension(directory: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(directory) {
        let entry = entry.map_err(|error| QuireError::WalkDir {
            path: directory.to_path_buf(),
            message: error.to_string(),
        })?;
        if entry.file_type().is_file()
            && let Some(file_extension) = entry.path().extension()
            && file_extension == extension
        {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Minifies every `.html` file under `output_dir` in place, inline CSS and
/// JS included. Returns the number of files rewritten.
pub fn minify_output(output_dir: &Path) -> Result<usize> {
    let html_files = collect_files_with_extension(output_dir, "html")?;

    let mut cfg = minify_html::Cfg::new();
    cfg.minify_css = true;
    cfg.minify_js = true;
    cfg.keep_closing_tags = true;

    for file_path in &html_files {
        let content = fs::read(file_path).io_context("reading", file_path)?;
        let minified = minify_html::minify(&content, &cfg);
        fs::write(file_path, minified).io_context("writing", file_path)?;
    }

    info!("Minified {} HTML files", html_files.len());
    Ok(html_files.len())
}
