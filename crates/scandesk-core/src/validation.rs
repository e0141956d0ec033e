//! Filename and content-type helpers shared by upload and ingestion paths.

use std::path::Path;

use crate::error::AppError;

const MAX_FILENAME_LENGTH: usize = 255;

/// Lowercased extension of `filename`, without the dot.
pub fn file_extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| ext.to_lowercase())
}

/// MIME type for a document extension. Unknown extensions map to octet-stream.
pub fn content_type_for_extension(extension: &str) -> &'static str {
    match extension.to_lowercase().as_str() {
        "pdf" => "application/pdf",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "tif" | "tiff" => "image/tiff",
        "xml" => "application/xml",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}

/// Whether a caller-supplied content type is plausible for the extension.
pub fn content_type_matches_extension(extension: &str, content_type: &str) -> bool {
    let expected = content_type_for_extension(extension);
    if expected == "application/octet-stream" {
        return true;
    }
    let content_type = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase();
    match extension.to_lowercase().as_str() {
        "xml" => content_type == "application/xml" || content_type == "text/xml",
        _ => content_type == expected,
    }
}

/// Strip directory components and unsafe characters from a client filename.
pub fn sanitize_filename(filename: &str) -> Result<String, AppError> {
    if filename
        .split(['/', '\\'])
        .any(|component| component == "..")
    {
        return Err(AppError::InvalidInput(
            "Filename contains invalid path traversal".to_string(),
        ));
    }

    let filename_only = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename);

    let sanitized: String = filename_only
        .chars()
        .take(MAX_FILENAME_LENGTH)
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.trim_matches(['.', '_']).is_empty() {
        return Err(AppError::InvalidInput("Filename is empty".to_string()));
    }

    Ok(sanitized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_extension_lowercases() {
        assert_eq!(file_extension("Scan_001.PDF").as_deref(), Some("pdf"));
        assert_eq!(file_extension("archive.tar.gz").as_deref(), Some("gz"));
        assert_eq!(file_extension("README"), None);
        assert_eq!(file_extension("trailing."), None);
    }

    #[test]
    fn test_content_type_table() {
        assert_eq!(content_type_for_extension("PDF"), "application/pdf");
        assert_eq!(content_type_for_extension("tif"), "image/tiff");
        assert_eq!(content_type_for_extension("exe"), "application/octet-stream");
    }

    #[test]
    fn test_content_type_match() {
        assert!(content_type_matches_extension("pdf", "application/pdf"));
        assert!(content_type_matches_extension("jpg", "image/jpeg; charset=binary"));
        assert!(content_type_matches_extension("xml", "text/xml"));
        assert!(!content_type_matches_extension("pdf", "image/png"));
    }

    #[test]
    fn test_sanitize_filename_rejects_path_traversal() {
        assert!(sanitize_filename("..").is_err());
        assert!(sanitize_filename("foo/../bar.pdf").is_err());
    }

    #[test]
    fn test_sanitize_filename_accepts_valid_names() {
        assert_eq!(sanitize_filename("contract.pdf").unwrap(), "contract.pdf");
        assert_eq!(sanitize_filename("my scan (1).pdf").unwrap(), "my_scan__1_.pdf");
        assert_eq!(sanitize_filename("inbox/id-front.jpg").unwrap(), "id-front.jpg");
    }
}
