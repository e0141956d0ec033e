//! Origin entity a document is attached to.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Business object a document belongs to.
///
/// Exactly one reference (or none, for `General`) can exist, so the derived
/// [`OriginKind`] can never disagree with the populated reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Origin {
    Client { id: i64 },
    Employee { id: i64 },
    Vehicle { id: i64 },
    Transaction { id: i64, date: NaiveDate },
    General,
}

impl Origin {
    pub fn kind(&self) -> OriginKind {
        match self {
            Origin::Client { .. } => OriginKind::Client,
            Origin::Employee { .. } => OriginKind::Employee,
            Origin::Vehicle { .. } => OriginKind::Vehicle,
            Origin::Transaction { .. } => OriginKind::Transaction,
            Origin::General => OriginKind::General,
        }
    }

    /// Referenced entity id, `None` for general documents.
    pub fn entity_id(&self) -> Option<i64> {
        match self {
            Origin::Client { id }
            | Origin::Employee { id }
            | Origin::Vehicle { id }
            | Origin::Transaction { id, .. } => Some(*id),
            Origin::General => None,
        }
    }

    /// Actor id that owns documents of this origin.
    ///
    /// Only people own documents: clients and employees. Vehicles, transactions and
    /// general documents have no owner.
    pub fn owner_id(&self) -> Option<i64> {
        match self {
            Origin::Client { id } | Origin::Employee { id } => Some(*id),
            _ => None,
        }
    }

    /// Path segment used when laying out managed storage.
    pub fn storage_segment(&self) -> String {
        match self.entity_id() {
            Some(id) => format!("{}-{}", self.kind(), id),
            None => self.kind().to_string(),
        }
    }

    /// Rebuild an origin from nullable relational columns.
    ///
    /// Fails when more than one reference is set, or when a transaction id arrives
    /// without its date.
    pub fn from_references(
        client_id: Option<i64>,
        employee_id: Option<i64>,
        vehicle_id: Option<i64>,
        transaction_id: Option<i64>,
        transaction_date: Option<NaiveDate>,
    ) -> Result<Self, String> {
        let populated = [
            client_id.is_some(),
            employee_id.is_some(),
            vehicle_id.is_some(),
            transaction_id.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count();
        if populated > 1 {
            return Err(format!(
                "document references {} origin entities, at most one is allowed",
                populated
            ));
        }

        match (client_id, employee_id, vehicle_id, transaction_id) {
            (Some(id), _, _, _) => Ok(Origin::Client { id }),
            (_, Some(id), _, _) => Ok(Origin::Employee { id }),
            (_, _, Some(id), _) => Ok(Origin::Vehicle { id }),
            (_, _, _, Some(id)) => {
                let date = transaction_date
                    .ok_or_else(|| format!("transaction {} is missing its date", id))?;
                Ok(Origin::Transaction { id, date })
            }
            _ => Ok(Origin::General),
        }
    }
}

impl Default for Origin {
    fn default() -> Self {
        Origin::General
    }
}

/// Derived discriminant of [`Origin`], exposed as `entity_origin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OriginKind {
    Client,
    Employee,
    Vehicle,
    Transaction,
    General,
}

impl OriginKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OriginKind::Client => "client",
            OriginKind::Employee => "employee",
            OriginKind::Vehicle => "vehicle",
            OriginKind::Transaction => "transaction",
            OriginKind::General => "general",
        }
    }
}

impl Display for OriginKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for OriginKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "client" => Ok(OriginKind::Client),
            "employee" => Ok(OriginKind::Employee),
            "vehicle" => Ok(OriginKind::Vehicle),
            "transaction" => Ok(OriginKind::Transaction),
            "general" => Ok(OriginKind::General),
            other => Err(format!("unknown origin kind: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_follows_variant() {
        assert_eq!(Origin::Client { id: 4 }.kind(), OriginKind::Client);
        assert_eq!(Origin::General.kind(), OriginKind::General);
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        assert_eq!(
            Origin::Transaction { id: 9, date }.kind().as_str(),
            "transaction"
        );
    }

    #[test]
    fn test_owner_only_for_people() {
        assert_eq!(Origin::Employee { id: 7 }.owner_id(), Some(7));
        assert_eq!(Origin::Client { id: 3 }.owner_id(), Some(3));
        assert_eq!(Origin::Vehicle { id: 3 }.owner_id(), None);
        assert_eq!(Origin::General.owner_id(), None);
    }

    #[test]
    fn test_from_references_rejects_two_entities() {
        let result = Origin::from_references(Some(1), None, Some(2), None, None);
        assert!(result.is_err());
    }

    #[test]
    fn test_from_references_requires_transaction_date() {
        assert!(Origin::from_references(None, None, None, Some(5), None).is_err());

        let date = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        let origin = Origin::from_references(None, None, None, Some(5), Some(date)).unwrap();
        assert_eq!(origin, Origin::Transaction { id: 5, date });
    }

    #[test]
    fn test_from_references_defaults_to_general() {
        let origin = Origin::from_references(None, None, None, None, None).unwrap();
        assert_eq!(origin, Origin::General);
        assert_eq!(origin.storage_segment(), "general");
        assert_eq!(Origin::Vehicle { id: 12 }.storage_segment(), "vehicle-12");
    }

    #[test]
    fn test_serde_tagged_representation() {
        let json = serde_json::to_value(Origin::Employee { id: 11 }).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "employee", "id": 11}));

        let parsed: Origin = serde_json::from_value(serde_json::json!({"kind": "general"})).unwrap();
        assert_eq!(parsed, Origin::General);
    }
}
