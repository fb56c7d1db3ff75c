//! Display helpers shared by the desktop views.

use chrono::{DateTime, Utc};

const SIZE_UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
pub const EXCERPT_PREVIEW_CHARS: usize = 150;

/// `1536` -> `"1.5 KB"`. Two decimals at most, trailing zeros dropped.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{rounded} {}", SIZE_UNITS[unit])
}

pub fn format_latency(seconds: f64) -> String {
    format!("{seconds:.2}s")
}

pub fn format_upload_date(uploaded_at: &DateTime<Utc>) -> String {
    uploaded_at.format("%Y-%m-%d").to_string()
}

pub fn format_message_time(created_at: &DateTime<Utc>) -> String {
    created_at.format("%H:%M").to_string()
}

pub fn excerpt_preview(excerpt: &str) -> String {
    match excerpt.char_indices().nth(EXCERPT_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &excerpt[..cut]),
        None => excerpt.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Word,
    Other,
}

impl FileKind {
    pub fn from_file_type(file_type: &str) -> Self {
        match file_type.to_ascii_lowercase().as_str() {
            "pdf" => FileKind::Pdf,
            "docx" | "doc" => FileKind::Word,
            _ => FileKind::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn file_sizes_use_binary_units() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(512), "512 Bytes");
        assert_eq!(format_file_size(1024), "1 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(20_480), "20 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024 + 300_000), "5.29 MB");
        assert_eq!(format_file_size(3 * 1024 * 1024 * 1024), "3 GB");
        assert_eq!(format_file_size(2048 * 1024 * 1024 * 1024), "2048 GB");
    }

    #[test]
    fn latency_has_two_decimals() {
        assert_eq!(format_latency(0.8), "0.80s");
        assert_eq!(format_latency(12.345), "12.35s");
    }

    #[test]
    fn dates_render_in_utc() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        assert_eq!(format_upload_date(&at), "2024-05-01");
        assert_eq!(format_message_time(&at), "09:30");
    }

    #[test]
    fn excerpt_is_cut_on_char_boundary() {
        assert_eq!(excerpt_preview("short"), "short");

        let exact = "a".repeat(EXCERPT_PREVIEW_CHARS);
        assert_eq!(excerpt_preview(&exact), exact);

        let long = "退".repeat(EXCERPT_PREVIEW_CHARS + 10);
        let preview = excerpt_preview(&long);
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), EXCERPT_PREVIEW_CHARS + 3);
    }

    #[test]
    fn file_kinds() {
        assert_eq!(FileKind::from_file_type("PDF"), FileKind::Pdf);
        assert_eq!(FileKind::from_file_type("docx"), FileKind::Word);
        assert_eq!(FileKind::from_file_type("doc"), FileKind::Word);
        assert_eq!(FileKind::from_file_type("md"), FileKind::Other);
    }
}
