//! Per-type document validation.

use chrono::{DateTime, Months, Utc};
use scandesk_core::models::{Document, DocumentType};
use scandesk_core::validation::file_extension;
use scandesk_core::AppError;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// No rule failed and the document is within its freshness window.
    pub valid: bool,
    pub expired: bool,
    pub errors: Vec<String>,
}

/// Applies the validation profile bound to each document type.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentValidator;

impl DocumentValidator {
    pub fn new() -> Self {
        Self
    }

    /// Rule violations for a file about to become a document of `document_type`.
    pub fn check_file(&self, document_type: DocumentType, filename: &str, size: u64) -> Vec<String> {
        let profile = document_type.profile();
        let mut errors = Vec::new();

        match file_extension(filename) {
            Some(ext) if profile.allows_extension(&ext) => {}
            Some(ext) => errors.push(format!(
                "Extension '{}' is not allowed for {} documents. Allowed: {}",
                ext,
                document_type,
                profile.allowed_extensions.join(", ")
            )),
            None => errors.push(format!(
                "File '{}' has no extension. Allowed for {} documents: {}",
                filename,
                document_type,
                profile.allowed_extensions.join(", ")
            )),
        }

        if size == 0 {
            errors.push("File is empty".to_string());
        } else if size > profile.max_size_bytes {
            errors.push(format!(
                "File size {} bytes exceeds the {} byte limit for {} documents",
                size, profile.max_size_bytes, document_type
            ));
        }

        errors
    }

    /// Fail with a `Validation` error when `check_file` reports anything.
    pub fn ensure_file(
        &self,
        document_type: DocumentType,
        filename: &str,
        size: u64,
    ) -> Result<(), AppError> {
        let errors = self.check_file(document_type, filename, size);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(errors))
        }
    }

    /// Whether a document uploaded at `uploaded_at` is past its type's maximum age.
    pub fn is_expired(
        &self,
        document_type: DocumentType,
        uploaded_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(months) = document_type.profile().max_age_months else {
            return false;
        };
        match uploaded_at.checked_add_months(Months::new(months)) {
            Some(expires_at) => expires_at < now,
            None => false,
        }
    }

    pub fn validate(&self, document: &Document, now: DateTime<Utc>) -> ValidationReport {
        let size = u64::try_from(document.file_size).unwrap_or(0);
        let errors = self.check_file(document.document_type, &document.original_filename, size);
        let expired = self.is_expired(document.document_type, document.uploaded_at, now);

        ValidationReport {
            valid: errors.is_empty() && !expired,
            expired,
            errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use scandesk_core::models::{AccessPolicy, NewDocument, Origin};
    use uuid::Uuid;

    fn document(document_type: DocumentType, filename: &str, size: i64) -> Document {
        Document::new_pending(NewDocument {
            id: Uuid::new_v4(),
            origin: Origin::Client { id: 1 },
            document_type,
            sub_type: None,
            storage_key: "documents/client-1/2026/01/a".to_string(),
            storage_url: "http://localhost/files/a".to_string(),
            original_filename: filename.to_string(),
            content_type: "application/pdf".to_string(),
            file_size: size,
            content_hash: "00".repeat(32),
            uploaded_by: Some(1),
            access_policy: AccessPolicy::Private,
            comment: None,
        })
    }

    #[test]
    fn test_check_file_accepts_allowed_extension() {
        let validator = DocumentValidator::new();
        assert!(validator
            .check_file(DocumentType::Contract, "contract.PDF", 2048)
            .is_empty());
    }

    #[test]
    fn test_check_file_reports_every_violation() {
        let validator = DocumentValidator::new();
        let errors = validator.check_file(DocumentType::Contract, "contract.exe", 100 * 1024 * 1024);
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("'exe'"));
        assert!(errors[1].contains("exceeds"));
    }

    #[test]
    fn test_missing_extension_and_empty_file() {
        let validator = DocumentValidator::new();
        let errors = validator.check_file(DocumentType::Other, "scan", 0);
        assert_eq!(errors.len(), 2);
        assert!(matches!(
            validator.ensure_file(DocumentType::Other, "scan", 0),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_proof_of_address_expires_after_three_months() {
        let validator = DocumentValidator::new();
        let uploaded = Utc.with_ymd_and_hms(2026, 1, 10, 9, 0, 0).unwrap();

        let within = Utc.with_ymd_and_hms(2026, 4, 9, 9, 0, 0).unwrap();
        assert!(!validator.is_expired(DocumentType::ProofOfAddress, uploaded, within));

        let after = Utc.with_ymd_and_hms(2026, 4, 11, 9, 0, 0).unwrap();
        assert!(validator.is_expired(DocumentType::ProofOfAddress, uploaded, after));

        assert!(!validator.is_expired(DocumentType::Identification, uploaded, after));
    }

    #[test]
    fn test_validate_reports_expiry_without_errors() {
        let validator = DocumentValidator::new();
        let doc = document(DocumentType::TaxCertificate, "sat.pdf", 500);

        let fresh = validator.validate(&doc, doc.uploaded_at + Duration::days(2));
        assert!(fresh.valid);

        let stale = validator.validate(&doc, doc.uploaded_at + Duration::days(45));
        assert!(stale.expired);
        assert!(!stale.valid);
        assert!(stale.errors.is_empty());
    }
}
