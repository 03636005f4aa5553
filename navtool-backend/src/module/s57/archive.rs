///! ENC archive (`<CELL>.zip`) extraction
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::parser::S57Parser;
use super::types::S57ParseResult;
use crate::error::{ChartError, Result};

const BASE_CELL_EXTENSION: &str = ".000";

/// Upper bound on what an entry's declared size may preallocate.
const MAX_PREALLOCATION: u64 = 16 * 1024 * 1024;

/// Entry holding the base cell: `<cell>.000` in any directory, matched
/// case-insensitively. Without a cell ID the first `.000` entry wins.
pub fn find_base_cell<'a>(
    names: impl IntoIterator<Item = &'a str>,
    cell_id: Option<&str>,
) -> Option<String> {
    let wanted = cell_id.map(|id| format!("{}{}", id, BASE_CELL_EXTENSION).to_ascii_lowercase());
    names
        .into_iter()
        .find(|name| {
            let lower = name.to_ascii_lowercase();
            let file_name = lower.rsplit('/').next().unwrap_or(&lower);
            match &wanted {
                Some(wanted) => file_name == wanted,
                None => file_name.ends_with(BASE_CELL_EXTENSION),
            }
        })
        .map(str::to_string)
}

/// Read the base cell bytes out of a downloaded archive.
pub fn read_base_cell(archive_path: &Path, cell_id: Option<&str>) -> Result<Vec<u8>> {
    let file = File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)?;

    let Some(name) = find_base_cell(archive.file_names(), cell_id) else {
        return Err(ChartError::Archive(format!(
            "{:?} has no {}{} entry",
            archive_path,
            cell_id.unwrap_or("*"),
            BASE_CELL_EXTENSION
        )));
    };

    let mut entry = archive.by_name(&name)?;
    let mut data = Vec::with_capacity(initial_capacity(entry.size()));
    entry.read_to_end(&mut data)?;
    tracing::debug!("Extracted {} ({} bytes) from {:?}", name, data.len(), archive_path);
    Ok(data)
}

/// The declared size comes from the archive header and is not trusted.
fn initial_capacity(declared_size: u64) -> usize {
    declared_size.min(MAX_PREALLOCATION) as usize
}

impl S57Parser {
    /// Parse a `.zip` archive or a bare `.000` file.
    pub fn parse_archive(&self, path: &Path, cell_id: Option<&str>) -> Result<S57ParseResult> {
        let is_archive = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
        let data = if is_archive {
            read_base_cell(path, cell_id)?
        } else {
            std::fs::read(path)?
        };

        let label = cell_id
            .map(str::to_string)
            .or_else(|| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_default();
        self.parse(&data).map_err(|e| e.with_cell_id(&label))
    }
}

/// [`S57Parser::parse_archive`] on the blocking pool.
pub async fn parse_archive_async(
    parser: Arc<S57Parser>,
    path: PathBuf,
    cell_id: Option<String>,
) -> Result<S57ParseResult> {
    tokio::task::spawn_blocking(move || parser.parse_archive(&path, cell_id.as_deref()))
        .await
        .map_err(|e| ChartError::Archive(format!("parse task failed: {}", e)))?
}
