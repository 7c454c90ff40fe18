//! Source archiving for quick builds
//!
//! The source folder is packed into a gzip-compressed tarball. Version control
//! metadata at the top level of the folder is left out.

use crate::error::handlers::ValidationErrorHandler;
use crate::error::{AcrError, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::path::Path;
use tokio::task;

/// Top-level entries never uploaded with the build context
pub const VCS_ENTRIES: &[&str] = &[".git", ".gitignore", ".bzr", ".bzrignore", ".hg", ".hgignore", ".svn"];

pub fn is_vcs_entry(name: &str) -> bool {
    VCS_ENTRIES.contains(&name)
}

/// Drop version control entries, keeping the order of the rest
pub fn filter_vcs_entries<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    names
        .into_iter()
        .map(Into::into)
        .filter(|name| !is_vcs_entry(name))
        .collect()
}

/// Top-level entries of `source` that go into the archive, sorted by name
pub fn archive_entries(source: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(filter_vcs_entries(names))
}

/// Write `source` as a `.tar.gz` to `destination` and return its size in bytes
pub async fn archive_source(source: &Path, destination: &Path) -> Result<u64> {
    ValidationErrorHandler::validate_source_folder(source)?;

    let source = source.to_path_buf();
    let destination = destination.to_path_buf();

    task::spawn_blocking(move || write_archive(&source, &destination))
        .await
        .map_err(|e| AcrError::Io(std::io::Error::other(format!("Archive task failed: {}", e))))?
}

fn write_archive(source: &Path, destination: &Path) -> Result<u64> {
    let file = File::create(destination)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for name in archive_entries(source)? {
        let path = source.join(&name);
        if path.is_dir() {
            builder.append_dir_all(&name, &path)?;
        } else {
            builder.append_path_with_name(&path, &name)?;
        }
    }

    let encoder = builder.into_inner()?;
    encoder.finish()?;

    Ok(fs::metadata(destination)?.len())
}
