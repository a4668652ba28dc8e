use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::cli::OutputFormat;
use crate::extractors::VideoRecord;

/// Column order of the CSV export; matches `VideoRecord` field order
const CSV_HEADER: [&str; 12] = [
    "video_id",
    "video_url",
    "title",
    "description",
    "views",
    "likes",
    "comments",
    "duration",
    "upload_date",
    "channel_name",
    "channel_id",
    "transcript",
];

/// Byte order mark so spreadsheet applications detect UTF-8
const UTF8_BOM: &str = "\u{feff}";

/// Save records to file and return the path actually written
pub fn save_to_file(records: &[VideoRecord], path: &Path, format: OutputFormat) -> Result<PathBuf> {
    let (path, content) = match format {
        OutputFormat::Csv => (
            with_extension(path, "csv"),
            format!("{}{}", UTF8_BOM, format_as_csv(records)),
        ),
        OutputFormat::Json => (path.to_path_buf(), format_as_json(records)?),
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs_err::create_dir_all(parent)?;
    }

    fs_err::write(&path, content).context("Failed to write output file")?;
    Ok(path)
}

/// Print records to console
pub fn print_to_console(records: &[VideoRecord], format: OutputFormat) -> Result<()> {
    let content = match format {
        OutputFormat::Csv => format_as_csv(records),
        OutputFormat::Json => format_as_json(records)?,
    };

    println!("{}", content);
    Ok(())
}

/// `path` with `.ext` appended unless it already ends in it
fn with_extension(path: &Path, ext: &str) -> PathBuf {
    let has_ext = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext));

    if has_ext {
        path.to_path_buf()
    } else {
        let mut name = path.as_os_str().to_owned();
        name.push(".");
        name.push(ext);
        PathBuf::from(name)
    }
}

/// Format records as CSV with a header row
pub fn format_as_csv(records: &[VideoRecord]) -> String {
    let mut csv = CSV_HEADER.join(",");
    csv.push_str("\r\n");

    for record in records {
        let comments = record
            .comments
            .as_ref()
            .map(|c| c.to_string())
            .unwrap_or_default();

        let row = [
            record.video_id.clone(),
            record.video_url.clone(),
            record.title.clone(),
            record.description.clone(),
            record.views.to_string(),
            record.likes.to_string(),
            comments,
            record.duration.clone(),
            record.upload_date.clone(),
            record.channel_name.clone(),
            record.channel_id.clone(),
            record.transcript.clone(),
        ];

        let row: Vec<String> = row.iter().map(|field| escape_csv_field(field)).collect();
        csv.push_str(&row.join(","));
        csv.push_str("\r\n");
    }

    csv
}

/// Quote a field when it contains a delimiter, quote or line break
fn escape_csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Format records as a pretty JSON array
pub fn format_as_json(records: &[VideoRecord]) -> Result<String> {
    serde_json::to_string_pretty(records).context("Failed to serialize records")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::Count;

    fn record() -> VideoRecord {
        VideoRecord {
            video_id: "abc".to_string(),
            video_url: "https://www.youtube.com/watch?v=abc".to_string(),
            title: "Hello, \"world\"".to_string(),
            description: "line one\nline two".to_string(),
            views: Count::Number(12),
            likes: Count::Raw("1.2K".to_string()),
            comments: None,
            duration: "PT1M".to_string(),
            upload_date: "2024-01-02".to_string(),
            channel_name: "Chan".to_string(),
            channel_id: "UC1".to_string(),
            transcript: String::new(),
        }
    }

    #[test]
    fn test_format_as_csv() {
        let csv = format_as_csv(&[record()]);
        let mut lines = csv.split("\r\n");

        assert_eq!(
            lines.next(),
            Some("video_id,video_url,title,description,views,likes,comments,duration,upload_date,channel_name,channel_id,transcript")
        );
        assert_eq!(
            lines.next(),
            Some("abc,https://www.youtube.com/watch?v=abc,\"Hello, \"\"world\"\"\",\"line one\nline two\",12,1.2K,,PT1M,2024-01-02,Chan,UC1,")
        );
    }

    #[test]
    fn test_format_as_json_keeps_field_order() {
        let json = format_as_json(&[record()]).unwrap();
        let video_id = json.find("\"video_id\"").unwrap();
        let transcript = json.find("\"transcript\"").unwrap();
        assert!(video_id < transcript);
        assert!(json.contains("\"views\": 12"));
        assert!(json.contains("\"likes\": \"1.2K\""));
        assert!(json.contains("\"comments\": null"));
    }

    #[test]
    fn test_save_csv_appends_extension_and_bom() {
        let dir = tempfile::tempdir().unwrap();
        let written = save_to_file(&[record()], &dir.path().join("export"), OutputFormat::Csv).unwrap();

        assert_eq!(written, dir.path().join("export.csv"));
        let content = fs_err::read_to_string(&written).unwrap();
        assert!(content.starts_with('\u{feff}'));
        assert!(content.contains("abc,"));

        let kept = save_to_file(&[], &dir.path().join("out.CSV"), OutputFormat::Csv).unwrap();
        assert_eq!(kept, dir.path().join("out.CSV"));
    }

    #[test]
    fn test_save_json_uses_path_as_given() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("videos.json");
        let written = save_to_file(&[record()], &path, OutputFormat::Json).unwrap();

        assert_eq!(written, path);
        let parsed: serde_json::Value =
            serde_json::from_str(&fs_err::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed[0]["video_id"], "abc");
    }
}
