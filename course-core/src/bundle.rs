//! Course bundle import/export.
//!
//! Bundles are ZIP files holding course documents plus a `bundle.json`
//! manifest. Exports preserve the directory layout inside the archive;
//! imports flatten nested paths into the target directory.

use std::fs;
use std::io::{Read, Seek, Write};
use std::path::Path;

use log::warn;
use serde::{Deserialize, Serialize};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::error::CourseResult;
use crate::fs::{DirectoryEntity, Entity};

/// Name of the manifest file inside a bundle.
pub const MANIFEST_NAME: &str = "bundle.json";

/// Bundle manifest schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleManifest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Archive-relative paths of the bundled course documents.
    #[serde(default)]
    pub courses: Vec<String>,
}

/// Export the courses under `dir` (recursively) as a bundle.
pub fn export_bundle<W: Write + Seek>(
    dir: &DirectoryEntity,
    name: &str,
    writer: W,
) -> CourseResult<()> {
    let mut files = Vec::new();
    collect_files(dir, "", &mut files);

    let manifest = BundleManifest {
        name: name.to_string(),
        description: None,
        courses: files.iter().map(|(rel, _)| rel.clone()).collect(),
    };

    let mut zip = ZipWriter::new(writer);
    let options = SimpleFileOptions::default();

    zip.start_file(MANIFEST_NAME, options)?;
    zip.write_all(&serde_json::to_vec_pretty(&manifest)?)?;

    for (rel, full) in files {
        let content = match fs::read(&full) {
            Ok(content) => content,
            Err(err) => {
                warn!("skipping unreadable bundle member {}: {}", full.display(), err);
                continue;
            }
        };
        zip.start_file(rel, options)?;
        zip.write_all(&content)?;
    }

    zip.finish()?;
    Ok(())
}

/// Import a bundle into `target` on disk.
///
/// Nested archive paths are flattened to their file name. The caller is
/// responsible for refreshing the tree afterwards. Returns the bundle's
/// manifest, or a default one when the archive carries none.
pub fn import_bundle<R: Read + Seek>(reader: R, target: &Path) -> CourseResult<BundleManifest> {
    let mut archive = ZipArchive::new(reader)?;
    let mut manifest: Option<BundleManifest> = None;

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if file.is_dir() {
            continue;
        }

        let name = file.name().to_string();
        let basename = name.rsplit('/').next().unwrap_or(&name).to_string();

        let mut content = Vec::new();
        file.read_to_end(&mut content)?;

        if basename.eq_ignore_ascii_case(MANIFEST_NAME) {
            match serde_json::from_slice(&content) {
                Ok(parsed) => manifest = Some(parsed),
                Err(err) => warn!("ignoring malformed {MANIFEST_NAME}: {err}"),
            }
            continue;
        }

        fs::write(target.join(&basename), &content)?;
    }

    Ok(manifest.unwrap_or_else(|| BundleManifest {
        name: "Unnamed bundle".to_string(),
        description: None,
        courses: Vec::new(),
    }))
}

fn collect_files(dir: &DirectoryEntity, prefix: &str, out: &mut Vec<(String, std::path::PathBuf)>) {
    for entry in dir.entries() {
        match entry {
            Entity::File(file) => {
                let rel = if prefix.is_empty() {
                    file.name().to_string()
                } else {
                    format!("{}/{}", prefix, file.name())
                };
                out.push((rel, file.full_path().to_path_buf()));
            }
            Entity::Directory(sub) => {
                let rel = if prefix.is_empty() {
                    sub.name().to_string()
                } else {
                    format!("{}/{}", prefix, sub.name())
                };
                collect_files(sub, &rel, out);
            }
        }
    }
}
