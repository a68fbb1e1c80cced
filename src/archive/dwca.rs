//! Unpacked archive directories of delimited text files
//!
//! The core file is `taxon.txt` (or `taxon.tsv`, `taxa.txt`, `taxon.csv`)
//! with a header row naming terms. An optional `meta.yaml` overrides file
//! names and delimiters and declares multi-value delimiters:
//!
//! ```yaml
//! core:
//!   file: taxa.tsv
//!   delimiter: "\t"
//!   multi_value:
//!     acceptedNameUsageID: "|"
//! extensions:
//!   - file: vernacular.txt
//!     type: VernacularName
//! ```

use super::{Archive, ArchiveError, ArchiveResult, ArchiveSchema, StarRecord};
use crate::model::{Extension, ExtensionRecord, Term};
use csv::{ReaderBuilder, StringRecord};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const DESCRIPTOR_FILE: &str = "meta.yaml";
const DEFAULT_CORE_FILES: [&str; 4] = ["taxon.txt", "taxon.tsv", "taxa.txt", "taxon.csv"];
const ID_COLUMNS: [&str; 2] = ["id", "coreid"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileDescriptor {
    pub file: String,
    pub delimiter: Option<String>,
    /// Multi-value delimiters keyed by term name
    pub multi_value: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionDescriptor {
    pub file: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub delimiter: Option<String>,
}

/// Contents of `meta.yaml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveDescriptor {
    pub core: Option<FileDescriptor>,
    pub extensions: Vec<ExtensionDescriptor>,
}

impl ArchiveDescriptor {
    pub fn read(path: impl AsRef<Path>) -> ArchiveResult<Self> {
        let file = File::open(path)?;
        Ok(serde_yaml::from_reader(file)?)
    }
}

#[derive(Debug)]
struct CoreFile {
    path: PathBuf,
    delimiter: u8,
    columns: Vec<Option<Term>>,
    id_column: Option<usize>,
}

/// A directory archive with one core file and optional extension files
#[derive(Debug)]
pub struct DwcaDirectory {
    dir: PathBuf,
    core: CoreFile,
    schema: ArchiveSchema,
    extensions: BTreeMap<Extension, HashMap<String, Vec<ExtensionRecord>>>,
}

impl DwcaDirectory {
    /// Opens an archive directory, reading headers and extension files.
    pub fn open(dir: impl AsRef<Path>) -> ArchiveResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        let meta_path = dir.join(DESCRIPTOR_FILE);
        let meta = if meta_path.exists() {
            ArchiveDescriptor::read(&meta_path)?
        } else {
            ArchiveDescriptor::default()
        };

        let core_desc = meta.core.clone().unwrap_or_default();
        let core_path = if core_desc.file.is_empty() {
            DEFAULT_CORE_FILES
                .iter()
                .map(|f| dir.join(f))
                .find(|p| p.exists())
                .ok_or_else(|| ArchiveError::MissingCore(dir.clone()))?
        } else {
            dir.join(&core_desc.file)
        };
        if !core_path.exists() {
            return Err(ArchiveError::MissingCore(dir));
        }
        let delimiter = resolve_delimiter(core_desc.delimiter.as_deref(), &core_path)?;
        let headers = read_headers(&core_path, delimiter)?;
        let columns: Vec<Option<Term>> = headers.iter().map(|h| Term::from_name(h)).collect();
        let id_column = find_column(&headers, &ID_COLUMNS).or_else(|| columns.iter().position(|c| *c == Some(Term::TaxonId)));

        let mut schema = ArchiveSchema::default();
        for term in columns.iter().flatten() {
            if !schema.core_terms.contains(term) {
                schema.core_terms.push(*term);
            }
        }
        for (name, delim) in &core_desc.multi_value {
            match Term::from_name(name) {
                Some(term) => {
                    schema.delimiters.insert(term, delim.clone());
                }
                None => warn!(term = %name, "Ignoring multi-value delimiter for unknown term"),
            }
        }

        let mut extensions = BTreeMap::new();
        for (ext, path, delim) in extension_files(&dir, &meta)? {
            let rows = read_extension(&path, delim)?;
            debug!(extension = ext.file_stem(), records = rows.len(), "Read extension file");
            schema.extensions.push(ext);
            extensions.insert(ext, rows);
        }

        Ok(Self {
            dir,
            core: CoreFile {
                path: core_path,
                delimiter,
                columns,
                id_column,
            },
            schema,
            extensions,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn to_record(&self, row: &StringRecord) -> StarRecord {
        let mut record = StarRecord {
            id: self.core.id_column.and_then(|i| row.get(i)).map(str::to_string),
            ..StarRecord::default()
        };
        for (value, term) in row.iter().zip(&self.core.columns) {
            if let Some(term) = term {
                record.core.insert(*term, value.to_string());
            }
        }
        if let Some(id) = record.id.as_deref().map(str::trim) {
            for (ext, rows) in &self.extensions {
                if let Some(found) = rows.get(id) {
                    record.extensions.insert(*ext, found.clone());
                }
            }
        }
        record
    }
}

impl Archive for DwcaDirectory {
    fn schema(&self) -> &ArchiveSchema {
        &self.schema
    }

    fn records(&self) -> ArchiveResult<Box<dyn Iterator<Item = ArchiveResult<StarRecord>> + '_>> {
        let reader = reader(&self.core.path, self.core.delimiter)?;
        Ok(Box::new(
            reader
                .into_records()
                .map(move |row| row.map(|r| self.to_record(&r)).map_err(ArchiveError::from)),
        ))
    }
}

fn reader(path: &Path, delimiter: u8) -> ArchiveResult<csv::Reader<File>> {
    Ok(ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .quoting(delimiter == b',')
        .from_path(path)?)
}

fn read_headers(path: &Path, delimiter: u8) -> ArchiveResult<Vec<String>> {
    let mut reader = reader(path, delimiter)?;
    Ok(reader.headers()?.iter().map(|h| h.trim().to_string()).collect())
}

fn find_column(headers: &[String], names: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| names.iter().any(|n| h.eq_ignore_ascii_case(n)))
}

fn resolve_delimiter(declared: Option<&str>, path: &Path) -> ArchiveResult<u8> {
    match declared {
        Some("\t") | Some("\\t") | Some("tab") => Ok(b'\t'),
        Some(d) if d.len() == 1 && d.is_ascii() => Ok(d.as_bytes()[0]),
        Some(d) => Err(ArchiveError::Delimiter(d.to_string())),
        None => {
            let is_csv = path.extension().is_some_and(|e| e.eq_ignore_ascii_case("csv"));
            Ok(if is_csv { b',' } else { b'\t' })
        }
    }
}

/// Extension files declared in the descriptor, or found by conventional name.
fn extension_files(dir: &Path, meta: &ArchiveDescriptor) -> ArchiveResult<Vec<(Extension, PathBuf, u8)>> {
    let mut files = Vec::new();
    if !meta.extensions.is_empty() {
        for desc in &meta.extensions {
            let Some(ext) = Extension::from_name(&desc.kind) else {
                warn!(kind = %desc.kind, file = %desc.file, "Ignoring unknown extension");
                continue;
            };
            let path = dir.join(&desc.file);
            let delim = resolve_delimiter(desc.delimiter.as_deref(), &path)?;
            files.push((ext, path, delim));
        }
        return Ok(files);
    }
    for ext in Extension::ALL {
        let stem = ext.file_stem();
        let candidates = [
            format!("{stem}.txt"),
            format!("{stem}s.txt"),
            format!("{stem}.tsv"),
            format!("{stem}.csv"),
        ];
        if let Some(path) = candidates.iter().map(|c| dir.join(c)).find(|p| p.exists()) {
            let delim = resolve_delimiter(None, &path)?;
            files.push((ext, path, delim));
        }
    }
    Ok(files)
}

/// Extension rows grouped by the core id they point to.
fn read_extension(path: &Path, delimiter: u8) -> ArchiveResult<HashMap<String, Vec<ExtensionRecord>>> {
    let mut reader = reader(path, delimiter)?;
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let columns: Vec<Option<Term>> = headers.iter().map(|h| Term::from_name(h)).collect();
    let Some(id_column) = find_column(&headers, &["coreid", "id", "taxonID"]) else {
        warn!(file = %path.display(), "Extension file without core id column ignored");
        return Ok(HashMap::new());
    };

    let mut rows: HashMap<String, Vec<ExtensionRecord>> = HashMap::new();
    for record in reader.records() {
        let record = record?;
        let Some(id) = record.get(id_column).map(str::trim).filter(|id| !id.is_empty()) else {
            continue;
        };
        let values: ExtensionRecord = record
            .iter()
            .zip(&columns)
            .enumerate()
            .filter(|(i, _)| *i != id_column)
            .filter_map(|(_, (value, term))| Some((*term.as_ref()?, value.to_string())))
            .collect();
        rows.entry(id.to_string()).or_default().push(values);
    }
    Ok(rows)
}
