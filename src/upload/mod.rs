//! Uploaded file checks and CSV parsing into a `RecordBatch`.

use std::path::Path;

use crate::{error::SubmissionError, models::RecordBatch};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// File part of a multipart submission, as extracted by the web layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_bytes: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Check that a file was chosen, is a `.csv` and fits within the size limit.
pub fn check_upload<'a>(
    file: Option<&'a UploadedFile>,
    limits: &UploadLimits,
) -> Result<&'a UploadedFile, SubmissionError> {
    let file = file.ok_or_else(|| SubmissionError::input("No file was uploaded"))?;

    if file.filename.trim().is_empty() {
        return Err(SubmissionError::input("No file selected"));
    }

    let is_csv = Path::new(file.filename.trim())
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);
    if !is_csv {
        return Err(SubmissionError::input(format!(
            "Unsupported file type '{}': please upload a CSV file",
            file.filename
        )));
    }

    if file.bytes.len() > limits.max_bytes {
        return Err(SubmissionError::input(format!(
            "File is too large ({} bytes, limit is {} bytes)",
            file.bytes.len(),
            limits.max_bytes
        )));
    }

    Ok(file)
}

/// Parse CSV bytes: a header row followed by at least one data row.
///
/// Header names and cells are trimmed. Rows whose field count differs from
/// the header, invalid UTF-8, and files without data rows are input-shape
/// errors. Cell values are not interpreted here.
pub fn read_batch(bytes: &[u8]) -> Result<RecordBatch, SubmissionError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(SubmissionError::input("The uploaded file is empty"));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let columns: Vec<String> = reader
        .headers()
        .map_err(unparsable)?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(unparsable)?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    if rows.is_empty() {
        return Err(SubmissionError::input("The file contains no data rows"));
    }

    Ok(RecordBatch { columns, rows })
}

fn unparsable(err: csv::Error) -> SubmissionError {
    let detail = match err.kind() {
        csv::ErrorKind::UnequalLengths {
            pos,
            expected_len,
            len,
        } => {
            let line = pos.as_ref().map(|p| p.line()).unwrap_or(0);
            format!("line {line} has {len} fields, expected {expected_len}")
        }
        csv::ErrorKind::Utf8 { .. } => "the file is not valid UTF-8".to_string(),
        _ => err.to_string(),
    };
    SubmissionError::input(format!("Could not read the CSV file: {detail}"))
}
