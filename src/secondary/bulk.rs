//! Newline-delimited bulk files.
//!
//! Every row is a directive line, followed by the document for `create`,
//! by `{"doc": ...}` for `update` and by nothing for `delete`:
//!
//! ```text
//! {"create":{"_index":"es_index","_type":"Person","_id":"doc_1"}}
//! {"name":"...","age":42}
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use super::SecondarySyncError;
use crate::operation::OperationKind;

pub const ROWS_PER_FILE: usize = 1000;

pub const INDEX_NAME: &str = "es_index";

#[derive(Serialize)]
struct Directive<'a> {
    #[serde(rename = "_index")]
    index: &'a str,
    #[serde(rename = "_type")]
    doc_type: &'a str,
    #[serde(rename = "_id")]
    id: &'a str,
}

#[derive(Serialize)]
struct PartialUpdate<'a> {
    doc: &'a Value,
}

/// The name of the file which starts with the given row.
pub fn file_name(kind: OperationKind, first_row: usize) -> String {
    format!("es_bulk_{kind}{first_row}.txt")
}

fn append_row(out: &mut String, kind: OperationKind, dataset: &str, key: &str, doc: Option<&Value>) {
    let directive = Directive {
        index: INDEX_NAME,
        doc_type: dataset,
        id: key,
    };
    // Tombstones are always deletions
    let action = match doc {
        Some(_) => kind,
        None => OperationKind::Delete,
    };
    let line = BTreeMap::from([(action.to_string(), directive)]);
    // Serializing string maps and JSON values cannot fail
    out.push_str(&serde_json::to_string(&line).unwrap_or_default());
    out.push('\n');

    match (action, doc) {
        (OperationKind::Update, Some(doc)) => {
            out.push_str(&serde_json::to_string(&PartialUpdate { doc }).unwrap_or_default());
            out.push('\n');
        }
        (OperationKind::Delete, _) | (_, None) => {}
        (_, Some(doc)) => {
            out.push_str(&doc.to_string());
            out.push('\n');
        }
    }
}

/// Writes the deltas into files of at most [`ROWS_PER_FILE`] rows each.
/// Existing files with the same names are replaced.
pub async fn write_files(
    dir: &Path,
    kind: OperationKind,
    dataset: &str,
    deltas: &BTreeMap<String, Option<Value>>,
) -> Result<Vec<PathBuf>, SecondarySyncError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| SecondarySyncError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

    let rows: Vec<_> = deltas.iter().collect();
    let mut files = Vec::with_capacity(rows.len().div_ceil(ROWS_PER_FILE));

    for (chunk_idx, chunk) in rows.chunks(ROWS_PER_FILE).enumerate() {
        let mut content = String::new();
        for (key, doc) in chunk {
            append_row(&mut content, kind, dataset, key, doc.as_ref());
        }

        let path = dir.join(file_name(kind, chunk_idx * ROWS_PER_FILE));
        tokio::fs::write(&path, content)
            .await
            .map_err(|source| SecondarySyncError::Io {
                path: path.clone(),
                source,
            })?;
        files.push(path);
    }
    Ok(files)
}
