//! Scan request options.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::access::AccessPolicy;
use super::document_type::{DocumentSubType, DocumentType};
use super::origin::Origin;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    Color,
    Grayscale,
    Monochrome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaperSize {
    Letter,
    Legal,
    A4,
    A5,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Pdf,
    Jpeg,
    Png,
    Tiff,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Pdf => "pdf",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::Tiff => "tiff",
        }
    }
}

/// Classification applied to the document a scan produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanTarget {
    #[serde(default)]
    pub origin: Origin,
    pub document_type: DocumentType,
    #[serde(default)]
    pub sub_type: Option<DocumentSubType>,
    #[serde(default)]
    pub access_policy: Option<AccessPolicy>,
}

impl ScanTarget {
    pub fn new(origin: Origin, document_type: DocumentType) -> Self {
        Self {
            origin,
            document_type,
            sub_type: None,
            access_policy: None,
        }
    }

    /// Target used for scans nobody asked for: general, unclassified, private.
    pub fn unassigned() -> Self {
        Self::new(Origin::General, DocumentType::Other)
    }

    pub fn with_sub_type(mut self, sub_type: DocumentSubType) -> Self {
        self.sub_type = Some(sub_type);
        self
    }

    pub fn with_access_policy(mut self, policy: AccessPolicy) -> Self {
        self.access_policy = Some(policy);
        self
    }

    pub fn policy(&self) -> AccessPolicy {
        self.access_policy.unwrap_or_default()
    }

    /// Check that the sub-type, when present, is scoped to the origin kind.
    pub fn check_sub_type(&self) -> Result<(), String> {
        match self.sub_type {
            Some(sub_type) if sub_type.scope() != self.origin.kind() => Err(format!(
                "sub-type for {} documents does not match origin {}",
                sub_type.scope(),
                self.origin.kind()
            )),
            _ => Ok(()),
        }
    }
}

impl Default for ScanTarget {
    fn default() -> Self {
        Self::unassigned()
    }
}

/// Parameters of one scan. Validated before reaching the device; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_scan_target", skip_on_field_errors = false))]
pub struct ScanOptions {
    #[serde(default = "default_resolution")]
    #[validate(range(min = 75, max = 1200, message = "Resolution must be between 75 and 1200 dpi"))]
    pub resolution: u32,
    #[serde(default = "default_color_mode")]
    pub color_mode: ColorMode,
    #[serde(default = "default_paper_size")]
    pub paper_size: PaperSize,
    #[serde(default = "default_output_format")]
    pub format: OutputFormat,
    #[serde(default)]
    pub duplex: bool,
    #[serde(default)]
    #[validate(range(min = -100, max = 100, message = "Brightness must be between -100 and 100"))]
    pub brightness: i32,
    #[serde(default)]
    #[validate(range(min = -100, max = 100, message = "Contrast must be between -100 and 100"))]
    pub contrast: i32,
    #[serde(default)]
    pub target: ScanTarget,
}

fn default_resolution() -> u32 {
    300
}

fn default_color_mode() -> ColorMode {
    ColorMode::Color
}

fn default_paper_size() -> PaperSize {
    PaperSize::Letter
}

fn default_output_format() -> OutputFormat {
    OutputFormat::Pdf
}

fn validate_scan_target(options: &ScanOptions) -> Result<(), ValidationError> {
    if let Err(message) = options.target.check_sub_type() {
        let mut error = ValidationError::new("sub_type_mismatch");
        error.message = Some(message.into());
        return Err(error);
    }
    if !options
        .target
        .document_type
        .profile()
        .allows_extension(options.format.extension())
    {
        let mut error = ValidationError::new("format_not_allowed");
        error.message = Some(
            format!(
                "{} output is not accepted for {} documents",
                options.format.extension(),
                options.target.document_type
            )
            .into(),
        );
        return Err(error);
    }
    Ok(())
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            resolution: default_resolution(),
            color_mode: default_color_mode(),
            paper_size: default_paper_size(),
            format: default_output_format(),
            duplex: false,
            brightness: 0,
            contrast: 0,
            target: ScanTarget::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EmployeeDocumentKind, VehicleDocumentKind};

    #[test]
    fn test_defaults_are_valid() {
        assert!(ScanOptions::default().validate().is_ok());
    }

    #[test]
    fn test_resolution_out_of_range() {
        let options = ScanOptions {
            resolution: 50,
            ..Default::default()
        };
        let errors = options.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("resolution"));
    }

    #[test]
    fn test_brightness_out_of_range() {
        let options = ScanOptions {
            brightness: -101,
            ..Default::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_sub_type_must_match_origin() {
        let options = ScanOptions {
            target: ScanTarget::new(Origin::Employee { id: 3 }, DocumentType::Other)
                .with_sub_type(DocumentSubType::Vehicle(VehicleDocumentKind::Title)),
            ..Default::default()
        };
        assert!(options.validate().is_err());

        let options = ScanOptions {
            target: ScanTarget::new(Origin::Employee { id: 3 }, DocumentType::Other).with_sub_type(
                DocumentSubType::Employee(EmployeeDocumentKind::EmploymentContract),
            ),
            ..Default::default()
        };
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_format_checked_against_type_profile() {
        let options = ScanOptions {
            format: OutputFormat::Jpeg,
            target: ScanTarget::new(Origin::Client { id: 1 }, DocumentType::Contract),
            ..Default::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let options: ScanOptions = serde_json::from_value(serde_json::json!({
            "target": {"origin": {"kind": "client", "id": 8}, "document_type": "identification"}
        }))
        .unwrap();
        assert_eq!(options.resolution, 300);
        assert_eq!(options.target.origin, Origin::Client { id: 8 });
        assert_eq!(options.target.policy(), AccessPolicy::Private);
    }
}
