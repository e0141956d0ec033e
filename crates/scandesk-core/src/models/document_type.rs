//! Document type catalog and per-type validation profiles.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use super::origin::OriginKind;

const MB: u64 = 1024 * 1024;

const SCAN_EXTENSIONS: &[&str] = &["pdf", "jpg", "jpeg", "png", "tif", "tiff"];
const PDF_ONLY: &[&str] = &["pdf"];

/// Closed catalog of document classifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "document_type", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Identification,
    ProofOfAddress,
    Invoice,
    Contract,
    PowerOfAttorney,
    VehicleTitle,
    CirculationCard,
    TaxCertificate,
    InsurancePolicy,
    Other,
}

impl DocumentType {
    pub const ALL: [DocumentType; 10] = [
        DocumentType::Identification,
        DocumentType::ProofOfAddress,
        DocumentType::Invoice,
        DocumentType::Contract,
        DocumentType::PowerOfAttorney,
        DocumentType::VehicleTitle,
        DocumentType::CirculationCard,
        DocumentType::TaxCertificate,
        DocumentType::InsurancePolicy,
        DocumentType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Identification => "identification",
            DocumentType::ProofOfAddress => "proof_of_address",
            DocumentType::Invoice => "invoice",
            DocumentType::Contract => "contract",
            DocumentType::PowerOfAttorney => "power_of_attorney",
            DocumentType::VehicleTitle => "vehicle_title",
            DocumentType::CirculationCard => "circulation_card",
            DocumentType::TaxCertificate => "tax_certificate",
            DocumentType::InsurancePolicy => "insurance_policy",
            DocumentType::Other => "other",
        }
    }

    /// Human readable label used in reports.
    pub fn label(&self) -> &'static str {
        match self {
            DocumentType::Identification => "Identification",
            DocumentType::ProofOfAddress => "Proof-of-Address",
            DocumentType::Invoice => "Invoice",
            DocumentType::Contract => "Contract",
            DocumentType::PowerOfAttorney => "Power-of-Attorney",
            DocumentType::VehicleTitle => "Vehicle-Title",
            DocumentType::CirculationCard => "Circulation-Card",
            DocumentType::TaxCertificate => "Tax-Certificate",
            DocumentType::InsurancePolicy => "Insurance-Policy",
            DocumentType::Other => "Other",
        }
    }

    /// Validation profile bound to this type. Every type has one.
    pub fn profile(&self) -> ValidationProfile {
        match self {
            DocumentType::Identification => ValidationProfile {
                allowed_extensions: SCAN_EXTENSIONS,
                max_size_bytes: 10 * MB,
                max_age_months: None,
                requires_verification: true,
                requires_signature: false,
            },
            DocumentType::ProofOfAddress => ValidationProfile {
                allowed_extensions: SCAN_EXTENSIONS,
                max_size_bytes: 10 * MB,
                max_age_months: Some(3),
                requires_verification: true,
                requires_signature: false,
            },
            DocumentType::Invoice => ValidationProfile {
                allowed_extensions: &["pdf", "xml"],
                max_size_bytes: 5 * MB,
                max_age_months: None,
                requires_verification: false,
                requires_signature: false,
            },
            DocumentType::Contract => ValidationProfile {
                allowed_extensions: PDF_ONLY,
                max_size_bytes: 20 * MB,
                max_age_months: None,
                requires_verification: true,
                requires_signature: true,
            },
            DocumentType::PowerOfAttorney => ValidationProfile {
                allowed_extensions: PDF_ONLY,
                max_size_bytes: 10 * MB,
                max_age_months: Some(12),
                requires_verification: true,
                requires_signature: true,
            },
            DocumentType::VehicleTitle => ValidationProfile {
                allowed_extensions: SCAN_EXTENSIONS,
                max_size_bytes: 10 * MB,
                max_age_months: None,
                requires_verification: true,
                requires_signature: false,
            },
            DocumentType::CirculationCard => ValidationProfile {
                allowed_extensions: SCAN_EXTENSIONS,
                max_size_bytes: 10 * MB,
                max_age_months: Some(12),
                requires_verification: false,
                requires_signature: false,
            },
            DocumentType::TaxCertificate => ValidationProfile {
                allowed_extensions: PDF_ONLY,
                max_size_bytes: 5 * MB,
                max_age_months: Some(1),
                requires_verification: false,
                requires_signature: false,
            },
            DocumentType::InsurancePolicy => ValidationProfile {
                allowed_extensions: PDF_ONLY,
                max_size_bytes: 10 * MB,
                max_age_months: Some(12),
                requires_verification: false,
                requires_signature: false,
            },
            DocumentType::Other => ValidationProfile {
                allowed_extensions: &["pdf", "jpg", "jpeg", "png", "tif", "tiff", "xml", "txt"],
                max_size_bytes: 50 * MB,
                max_age_months: None,
                requires_verification: false,
                requires_signature: false,
            },
        }
    }
}

impl Display for DocumentType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.label())
    }
}

impl FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        DocumentType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| format!("unknown document type: {}", s))
    }
}

/// Per-type rule set checked at creation and on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ValidationProfile {
    pub allowed_extensions: &'static [&'static str],
    pub max_size_bytes: u64,
    /// Documents older than this many months are reported as expired.
    pub max_age_months: Option<u32>,
    pub requires_verification: bool,
    pub requires_signature: bool,
}

impl ValidationProfile {
    pub fn allows_extension(&self, extension: &str) -> bool {
        let extension = extension.to_lowercase();
        self.allowed_extensions.iter().any(|e| *e == extension)
    }

    pub fn expires(&self) -> bool {
        self.max_age_months.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmployeeDocumentKind {
    EmploymentContract,
    Identification,
    ProofOfAddress,
    TaxId,
    SocialSecurity,
    Certificate,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleDocumentKind {
    Title,
    CirculationCard,
    Insurance,
    EmissionsCheck,
    TenureTax,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionDocumentKind {
    Invoice,
    SaleContract,
    PaymentReceipt,
    DeliveryCertificate,
    Other,
}

/// Narrower classification scoped to the origin entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", content = "kind", rename_all = "lowercase")]
pub enum DocumentSubType {
    Employee(EmployeeDocumentKind),
    Vehicle(VehicleDocumentKind),
    Transaction(TransactionDocumentKind),
}

impl DocumentSubType {
    /// Origin kind this sub-type is scoped to.
    pub fn scope(&self) -> OriginKind {
        match self {
            DocumentSubType::Employee(_) => OriginKind::Employee,
            DocumentSubType::Vehicle(_) => OriginKind::Vehicle,
            DocumentSubType::Transaction(_) => OriginKind::Transaction,
        }
    }

    /// Snake-case name of the inner kind, used for relational storage.
    pub fn kind_name(&self) -> String {
        let value = match self {
            DocumentSubType::Employee(kind) => serde_json::to_value(kind),
            DocumentSubType::Vehicle(kind) => serde_json::to_value(kind),
            DocumentSubType::Transaction(kind) => serde_json::to_value(kind),
        };
        value
            .ok()
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_default()
    }

    /// Parse a stored kind name for the given scope.
    pub fn parse(scope: OriginKind, kind: &str) -> Result<Self, String> {
        let value = serde_json::Value::String(kind.to_string());
        let parsed = match scope {
            OriginKind::Employee => serde_json::from_value(value).map(DocumentSubType::Employee),
            OriginKind::Vehicle => serde_json::from_value(value).map(DocumentSubType::Vehicle),
            OriginKind::Transaction => {
                serde_json::from_value(value).map(DocumentSubType::Transaction)
            }
            other => return Err(format!("{} documents have no sub-types", other)),
        };
        parsed.map_err(|e| format!("invalid {} document kind '{}': {}", scope, kind, e))
    }
}
