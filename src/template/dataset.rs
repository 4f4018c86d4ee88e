use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use tracing::{info, warn};

use super::DocumentTemplate;
use crate::payload::Payload;

/// Replays records of a prepared JSON-lines file.
///
/// Records are loaded once and never change afterwards. Document `id`
/// (1-based) gets record `id - 1`. If the file has fewer records than
/// operations, the list is extended by repeating records from the start.
pub struct DatasetTemplate {
    name: String,
    records: Vec<Map<String, Value>>,
}

impl DatasetTemplate {
    pub fn load(path: &Path, name: &str, num_ops: u64) -> Result<Self> {
        let file = File::open(path).context("Failed to open the data file")?;
        Self::from_reader(BufReader::new(file), name, num_ops)
    }

    /// Reads at most `num_ops` records, but always at least one.
    ///
    /// Lines that are not valid UTF-8 or not a JSON object are skipped.
    pub fn from_reader(mut reader: impl BufRead, name: &str, num_ops: u64) -> Result<Self> {
        let wanted = (num_ops as usize).max(1);
        let mut records = Vec::new();
        let mut skipped = 0;
        let mut line = Vec::new();

        while records.len() < wanted {
            line.clear();
            if reader
                .read_until(b'\n', &mut line)
                .context("Failed to read the data file")?
                == 0
            {
                break;
            }
            let content = line.strip_suffix(b"\n").unwrap_or(&line[..]);
            let content = content.strip_suffix(b"\r").unwrap_or(content);
            if content.is_empty() {
                break;
            }
            match serde_json::from_slice::<Value>(content) {
                Ok(Value::Object(mut record)) => {
                    record.insert("type".into(), name.into());
                    records.push(record);
                }
                _ => skipped += 1,
            }
        }

        if skipped > 0 {
            warn!(dataset = name, skipped, "skipped malformed lines");
        }
        anyhow::ensure!(!records.is_empty(), "dataset {name} has no valid records");

        let available = records.len();
        for i in available..num_ops as usize {
            records.push(records[i % available].clone());
        }
        info!(dataset = name, available, total = records.len(), "dataset loaded");

        Ok(Self {
            name: name.to_string(),
            records,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl DocumentTemplate for DatasetTemplate {
    fn generate(&self, id: u64) -> Payload {
        let index = id.saturating_sub(1) as usize % self.records.len();
        Payload::Json(Value::Object(self.records[index].clone()))
    }

    fn mutate(&self, existing: Payload, _fields: &[String]) -> Result<Payload> {
        Ok(existing)
    }

    fn dataset_name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use super::*;

    const DATA: &str = "{\"title\": \"a\"}\n\
                        not json at all\n\
                        {\"title\": \"b\"}\n\
                        [1, 2, 3]\n\
                        {\"title\": \"c\"}\n";

    fn title(p: &Payload) -> String {
        p.as_json().unwrap()["title"].as_str().unwrap().to_string()
    }

    #[test]
    fn test_wrap_around() {
        let dataset = DatasetTemplate::from_reader(Cursor::new(DATA), "napa", 7).unwrap();
        assert_eq!(dataset.len(), 7);

        let titles: Vec<String> = (1..=7).map(|id| title(&dataset.generate(id))).collect();
        assert_eq!(titles, ["a", "b", "c", "a", "b", "c", "a"]);

        // Record `n` (0-based) repeats record `n mod available`
        assert_eq!(dataset.generate(7), dataset.generate(1));
        assert_eq!(dataset.generate(7).as_json().unwrap()["type"], "napa");
    }

    #[test]
    fn test_stops_early() {
        let dataset = DatasetTemplate::from_reader(Cursor::new(DATA), "napa", 2).unwrap();
        assert_eq!(dataset.len(), 2);

        let with_blank = "{\"title\": \"a\"}\n\n{\"title\": \"b\"}\n";
        let dataset = DatasetTemplate::from_reader(Cursor::new(with_blank), "x", 3).unwrap();
        let titles: Vec<String> = (1..=3).map(|id| title(&dataset.generate(id))).collect();
        assert_eq!(titles, ["a", "a", "a"]);
    }

    #[test]
    fn test_invalid_utf8_is_skipped() {
        let data: &[u8] = b"{\"title\":\"a\"}\n\xff\xfe bad bytes\n{\"title\":\"b\"}\n";
        let dataset = DatasetTemplate::from_reader(Cursor::new(data), "napa", 2).unwrap();
        assert_eq!(dataset.len(), 2);
        let titles: Vec<String> = (1..=2).map(|id| title(&dataset.generate(id))).collect();
        assert_eq!(titles, ["a", "b"]);
    }

    #[test]
    fn test_zero_ops_still_loads() {
        let dataset = DatasetTemplate::from_reader(Cursor::new(DATA), "napa", 0).unwrap();
        assert_eq!(dataset.len(), 1);
        assert_eq!(title(&dataset.generate(1)), "a");
    }

    #[test]
    fn test_mutate_is_passthrough() {
        let dataset = DatasetTemplate::from_reader(Cursor::new(DATA), "napa", 3).unwrap();
        let doc = dataset.generate(2);
        let fields = vec!["title".to_string()];
        assert_eq!(dataset.mutate(doc.clone(), &fields).unwrap(), doc);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(DATA.as_bytes()).unwrap();

        let dataset = DatasetTemplate::load(file.path(), "wiki", 3).unwrap();
        assert_eq!(dataset.dataset_name(), "wiki");
        assert!(DatasetTemplate::from_reader(Cursor::new("garbage\n"), "x", 3).is_err());
        assert!(DatasetTemplate::load(Path::new("/nonexistent/file"), "x", 3).is_err());
    }
}
