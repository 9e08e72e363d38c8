//! Zip framing around the vendor's TSV payloads. Pure framing, no business
//! logic: the import pipeline owns the temp dir members are extracted into,
//! so their lifetime is bounded by that scope even on error.

use std::fs;
use std::io::{self, Cursor, Write};
use std::path::{Path, PathBuf};

use zip::write::FileOptions;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("archive io error: {0}")]
    Io(#[from] io::Error),
}

/// Bundle named payloads into a single zip, in entry order.
pub fn bundle(entries: &[(String, Vec<u8>)]) -> Result<Vec<u8>, ArchiveError> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default();
    for (name, payload) in entries {
        writer.start_file(name.as_str(), options)?;
        writer.write_all(payload)?;
    }
    Ok(writer.finish()?.into_inner())
}

/// Extract every file member of `archive_path` into `dest_dir`, flattening
/// any directory components in member names. Returns the extracted paths in
/// archive order.
pub fn extract_all(archive_path: &Path, dest_dir: &Path) -> Result<Vec<PathBuf>, ArchiveError> {
    let file = fs::File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    let mut members = Vec::new();
    for index in 0..archive.len() {
        let mut member = archive.by_index(index)?;
        if member.is_dir() {
            continue;
        }
        let name = member.name().to_string();
        let Some(file_name) = Path::new(&name).file_name() else {
            continue;
        };
        let out_path = dest_dir.join(file_name);
        let mut out = fs::File::create(&out_path)?;
        io::copy(&mut member, &mut out)?;
        members.push(out_path);
    }
    Ok(members)
}
