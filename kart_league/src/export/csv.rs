//! Minimal RFC 4180 writer.

/// Quote a field when it contains a delimiter, quote or line break
pub fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Builds CSV text with CRLF line endings
#[derive(Debug, Default)]
pub struct CsvWriter {
    out: String,
    rows: usize,
}

impl CsvWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a header row
    pub fn with_header(header: &[&str]) -> Self {
        let mut writer = Self::new();
        writer.write_record(header);
        writer
    }

    pub fn write_record<S: AsRef<str>>(&mut self, fields: &[S]) {
        let line = fields
            .iter()
            .map(|f| escape_field(f.as_ref()))
            .collect::<Vec<_>>()
            .join(",");
        self.out.push_str(&line);
        self.out.push_str("\r\n");
        self.rows += 1;
    }

    /// Rows written so far, header included
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn finish(self) -> String {
        self.out
    }
}
