use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use tokio::task::spawn_blocking;

use crate::record::{Provenance, Record};
use crate::Result;

/// Append-only CSV output. The header comes from whichever record is written first and
/// is never rewritten; later rows are appended positionally without checking it.
#[derive(Debug, Clone)]
pub struct RecordSink {
    path: PathBuf,
}

impl RecordSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        RecordSink { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `record` followed by its `url`, `page_number` and `number` columns.
    pub async fn append(&self, record: &Record, provenance: &Provenance) -> Result<()> {
        self.write(record.with_provenance(provenance)).await
    }

    pub async fn write(&self, record: Record) -> Result<()> {
        let path = self.path.clone();
        spawn_blocking(move || write_row(&path, &record)).await?
    }
}

fn write_row(path: &Path, record: &Record) -> Result<()> {
    let needs_header = match path.metadata() {
        Ok(meta) => meta.len() == 0,
        Err(_) => true,
    };

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_writer(file);

    if needs_header {
        writer.write_record(record.field_names())?;
    }
    writer.write_record(record.cells())?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Value;

    fn record(pairs: &[(&str, u32)]) -> Record {
        let mut record = Record::new();
        for (name, value) in pairs {
            record.insert(*name, Value::Int(*value));
        }
        record
    }

    #[tokio::test]
    async fn header_written_once_then_rows_appended() {
        let dir = tempfile::tempdir().unwrap();
        let sink = RecordSink::new(dir.path().join("out.csv"));

        sink.write(record(&[("a", 1), ("b", 2)])).await.unwrap();
        sink.write(record(&[("a", 3), ("b", 4)])).await.unwrap();

        let text = std::fs::read_to_string(sink.path()).unwrap();
        assert_eq!(text, "a,b\n1,2\n3,4\n");
    }

    #[tokio::test]
    async fn different_field_set_is_appended_positionally() {
        let dir = tempfile::tempdir().unwrap();
        let sink = RecordSink::new(dir.path().join("out.csv"));

        sink.write(record(&[("a", 1), ("b", 2)])).await.unwrap();
        sink.write(record(&[("a", 3), ("b", 4)])).await.unwrap();
        sink.write(record(&[("c", 5), ("a", 6), ("d", 7)])).await.unwrap();

        let text = std::fs::read_to_string(sink.path()).unwrap();
        assert_eq!(text, "a,b\n1,2\n3,4\n5,6,7\n");
    }

    #[tokio::test]
    async fn multiline_values_stay_on_one_row() {
        let dir = tempfile::tempdir().unwrap();
        let sink = RecordSink::new(dir.path().join("out.csv"));

        let mut rec = Record::new();
        rec.insert("description", "Line one\nLine two, with comma");
        sink.append(
            &rec,
            &Provenance {
                url: "https://example.org/n/1".to_string(),
                page_number: 1,
                number: 0,
            },
        )
        .await
        .unwrap();

        let text = std::fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "description,url,page_number,number");
        assert_eq!(
            lines[1],
            "\"Line one Line two, with comma\",https://example.org/n/1,1,0"
        );
    }
}
