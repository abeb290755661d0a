//! CSV serialization for fixture files.
//!
//! Output is RFC4180-shaped: header line first, values quoted only when they
//! contain a comma, a double quote, or a newline, and a trailing newline after
//! the final record.

use anyhow::Context;
use csv::{QuoteStyle, WriterBuilder};
use std::path::Path;

use crate::models::FieldValue;

/// Render a header and rows to CSV text
pub fn render(columns: &[&str], rows: &[Vec<FieldValue>]) -> Result<String, csv::Error> {
    let mut buf = Vec::new();
    {
        let mut writer = WriterBuilder::new()
            .quote_style(QuoteStyle::Necessary)
            .from_writer(&mut buf);

        writer.write_record(columns)?;
        for row in rows {
            writer.write_record(row.iter().map(|value| value.to_string()))?;
        }
        writer.flush()?;
    }

    // The writer only ever receives UTF-8
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Render and persist one fixture file
pub fn write_file(path: &Path, columns: &[&str], rows: &[Vec<FieldValue>]) -> anyhow::Result<()> {
    let content = render(columns, rows)?;
    std::fs::write(path, content).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plain_values_stay_unquoted() {
        let rows = vec![vec![FieldValue::Int(7), FieldValue::from("open")]];
        let out = render(&["id", "status"], &rows).unwrap();
        assert_eq!(out, "id,status\n7,open\n");
    }

    #[test]
    fn test_comma_and_quote_escaping() {
        let rows = vec![vec![
            FieldValue::from("Budget Approval - 17"),
            FieldValue::from("review, then file"),
            FieldValue::from(r#"say "done""#),
        ]];
        let out = render(&["subject", "comment", "note"], &rows).unwrap();
        assert_eq!(
            out,
            "subject,comment,note\nBudget Approval - 17,\"review, then file\",\"say \"\"done\"\"\"\n"
        );
    }

    #[test]
    fn test_newline_in_value_is_quoted() {
        let rows = vec![vec![FieldValue::from("line one\nline two")]];
        let out = render(&["comment"], &rows).unwrap();
        assert_eq!(out, "comment\n\"line one\nline two\"\n");
    }

    #[test]
    fn test_header_only_when_no_rows() {
        let out = render(&["token", "userId"], &[]).unwrap();
        assert_eq!(out, "token,userId\n");
    }

    #[test]
    fn test_round_trip_recovers_escaped_fields() {
        let rows = vec![
            vec![FieldValue::from("a,b"), FieldValue::Int(1)],
            vec![FieldValue::from("plain"), FieldValue::Int(2)],
        ];
        let out = render(&["text", "id"], &rows).unwrap();

        let mut reader = csv::Reader::from_reader(out.as_bytes());
        assert_eq!(
            reader.headers().unwrap(),
            &csv::StringRecord::from(vec!["text", "id"])
        );
        let records: Vec<csv::StringRecord> =
            reader.records().collect::<Result<_, _>>().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(&records[0][0], "a,b");
        assert_eq!(&records[0][1], "1");
        assert_eq!(&records[1][0], "plain");
    }

    #[test]
    fn test_write_file_persists_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("BrowseTasks.csv");
        let rows = vec![vec![FieldValue::Int(3), FieldValue::Int(9)]];
        write_file(&path, &["taskId", "userId"], &rows).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "taskId,userId\n3,9\n");
    }
}
