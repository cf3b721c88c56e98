use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use sgp4::{Constants, Elements};

use crate::catalog::error::CatalogError;
use crate::catalog::snapshot::Catalog;
use crate::catalog::types::OrbitalObject;

pub struct TleLoader {
    tle_dir: PathBuf,
}

impl TleLoader {
    pub fn new(tle_dir: PathBuf) -> Self {
        Self { tle_dir }
    }

    /// Load every TLE file in the directory into a fresh snapshot.
    ///
    /// Files that fail to parse are skipped with a warning. When the same
    /// object appears twice, the set with the newer epoch wins.
    pub fn load(&self) -> Result<Catalog, CatalogError> {
        if !self.tle_dir.exists() {
            return Err(CatalogError::DirectoryNotFound(
                self.tle_dir.display().to_string(),
            ));
        }

        let mut objects = BTreeMap::new();

        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.tle_dir)? {
            let path = entry?.path();
            if path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext == "tle" || ext == "txt")
            {
                paths.push(path);
            }
        }
        paths.sort();

        for path in paths {
            match parse_tle_file(&path) {
                Ok(parsed) => {
                    for object in parsed {
                        insert_newest(&mut objects, object);
                    }
                }
                Err(e) => {
                    log::warn!("Failed to parse TLE file {}: {}", path.display(), e);
                }
            }
        }

        log::info!(
            "Loaded {} objects from {}",
            objects.len(),
            self.tle_dir.display()
        );
        Ok(Catalog::from_objects(objects.into_values()))
    }
}

fn insert_newest(objects: &mut BTreeMap<u32, OrbitalObject>, object: OrbitalObject) {
    match objects.get(&object.id) {
        Some(existing) if existing.epoch >= object.epoch => {}
        _ => {
            objects.insert(object.id, object);
        }
    }
}

fn parse_tle_file(path: &Path) -> Result<Vec<OrbitalObject>, CatalogError> {
    let content = fs::read_to_string(path)?;
    let filename = path
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();
    parse_tle_text(&content, &filename)
}

/// Parse multi-object TLE text (2-line or named 3-line sets).
pub fn parse_tle_text(content: &str, source: &str) -> Result<Vec<OrbitalObject>, CatalogError> {
    let mut results = Vec::new();

    for (name, line1, line2) in split_tle_sets(content) {
        let invalid = |message: String| CatalogError::InvalidTle {
            file: source.to_string(),
            message,
        };

        let elements = Elements::from_tle(name.clone(), line1.as_bytes(), line2.as_bytes())
            .map_err(|e| invalid(e.to_string()))?;
        let constants =
            Constants::from_elements(&elements).map_err(|e| invalid(e.to_string()))?;
        let id = u32::try_from(elements.norad_id)
            .map_err(|_| invalid(format!("catalog number {} out of range", elements.norad_id)))?;

        results.push(OrbitalObject {
            id,
            name: name.unwrap_or_else(|| format!("NORAD {}", id)),
            epoch: elements.datetime.and_utc(),
            source: source.to_string(),
            elements,
            constants,
        });
    }

    Ok(results)
}

fn split_tle_sets(content: &str) -> Vec<(Option<String>, String, String)> {
    let lines: Vec<&str> = content
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect();

    let mut result = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        if lines[i].starts_with("1 ") && i + 1 < lines.len() && lines[i + 1].starts_with("2 ") {
            result.push((None, lines[i].to_string(), lines[i + 1].to_string()));
            i += 2;
        } else if i + 2 < lines.len()
            && lines[i + 1].starts_with("1 ")
            && lines[i + 2].starts_with("2 ")
        {
            result.push((
                Some(lines[i].to_string()),
                lines[i + 1].to_string(),
                lines[i + 2].to_string(),
            ));
            i += 3;
        } else {
            i += 1;
        }
    }

    result
}
