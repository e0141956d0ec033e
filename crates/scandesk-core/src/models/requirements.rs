use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use super::document_type::DocumentType;

/// Kind of dealership transaction with a required document bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Sale,
    Purchase,
    Financing,
    Consignment,
}

impl TransactionKind {
    pub fn required_documents(&self) -> &'static [DocumentType] {
        match self {
            TransactionKind::Sale => &[
                DocumentType::Identification,
                DocumentType::ProofOfAddress,
                DocumentType::Invoice,
                DocumentType::Contract,
            ],
            TransactionKind::Purchase => &[
                DocumentType::Identification,
                DocumentType::ProofOfAddress,
                DocumentType::VehicleTitle,
                DocumentType::PowerOfAttorney,
            ],
            TransactionKind::Financing => &[
                DocumentType::Identification,
                DocumentType::ProofOfAddress,
                DocumentType::TaxCertificate,
                DocumentType::Contract,
            ],
            TransactionKind::Consignment => &[
                DocumentType::Identification,
                DocumentType::VehicleTitle,
                DocumentType::CirculationCard,
                DocumentType::Contract,
            ],
        }
    }
}

impl Display for TransactionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            TransactionKind::Sale => write!(f, "sale"),
            TransactionKind::Purchase => write!(f, "purchase"),
            TransactionKind::Financing => write!(f, "financing"),
            TransactionKind::Consignment => write!(f, "consignment"),
        }
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sale" => Ok(TransactionKind::Sale),
            "purchase" => Ok(TransactionKind::Purchase),
            "financing" => Ok(TransactionKind::Financing),
            "consignment" => Ok(TransactionKind::Consignment),
            other => Err(format!("unknown transaction kind: {}", other)),
        }
    }
}

/// Completeness of a client's document bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredSetReport {
    pub complete: bool,
    pub missing: Vec<DocumentType>,
    pub expired: Vec<DocumentType>,
}

impl RequiredSetReport {
    pub fn new(missing: Vec<DocumentType>, expired: Vec<DocumentType>) -> Self {
        Self {
            complete: missing.is_empty() && expired.is_empty(),
            missing,
            expired,
        }
    }
}
