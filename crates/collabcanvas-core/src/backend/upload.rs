//! Upload naming rules shared by the client and the reference server.

use chrono::NaiveDateTime;

/// Extensions the upload endpoint accepts.
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "txt", "pdf", "png", "jpg", "jpeg", "gif", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "svg", "webp",
    "bmp", "tiff",
];

/// Public URL prefix of stored uploads.
pub const UPLOAD_URL_PREFIX: &str = "/static/uploads/canvas/";

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "svg", "webp", "bmp", "tiff"];

/// Lowercased extension after the last dot, if any.
pub fn file_extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

pub fn allowed_file(filename: &str) -> bool {
    file_extension(filename).is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
}

pub fn is_image_extension(ext: &str) -> bool {
    IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
}

/// Reduce a client-supplied name to a safe file name.
///
/// Path components are dropped, whitespace becomes `_`, and anything other
/// than ASCII alphanumerics, `.`, `_` and `-` is removed. Leading dots are
/// stripped so the result is never hidden.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .filter_map(|c| match c {
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') => Some(c),
            c if c.is_whitespace() => Some('_'),
            _ => None,
        })
        .collect();
    cleaned.trim_start_matches('.').to_string()
}

/// Stored name: `YYYYMMDD_HHMMSS_` followed by the sanitized original.
pub fn stamped_filename(original: &str, now: NaiveDateTime) -> String {
    format!("{}{}", now.format("%Y%m%d_%H%M%S_"), sanitize_filename(original))
}

pub fn public_url(stored_name: &str) -> String {
    format!("{UPLOAD_URL_PREFIX}{stored_name}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_allowed_file() {
        assert!(allowed_file("photo.PNG"));
        assert!(allowed_file("report.final.pdf"));
        assert!(!allowed_file("script.exe"));
        assert!(!allowed_file("noextension"));
        assert!(!allowed_file("trailing."));
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("my photo (1).png"), "my_photo_1.png");
        assert_eq!(sanitize_filename("C:\\Users\\a\\doc.txt"), "doc.txt");
        assert_eq!(sanitize_filename(".hidden"), "hidden");
    }

    #[test]
    fn test_stamped_filename() {
        let now = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(7, 5, 1)
            .unwrap();
        let stored = stamped_filename("a b.png", now);
        assert_eq!(stored, "20240309_070501_a_b.png");
        assert_eq!(public_url(&stored), "/static/uploads/canvas/20240309_070501_a_b.png");
    }

    #[test]
    fn test_image_extension() {
        assert!(is_image_extension("JPG"));
        assert!(!is_image_extension("pdf"));
    }
}
