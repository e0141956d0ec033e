use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Review state of a document. `Approved` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "document_state", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum DocumentState {
    Pending,
    Approved,
    Rejected,
}

impl DocumentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentState::Pending => "pending",
            DocumentState::Approved => "approved",
            DocumentState::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, DocumentState::Pending)
    }

    /// Whether `self -> next` is a legal lifecycle edge.
    pub fn can_transition_to(&self, next: DocumentState) -> bool {
        matches!(
            (self, next),
            (DocumentState::Pending, DocumentState::Approved)
                | (DocumentState::Pending, DocumentState::Rejected)
        )
    }
}

impl Default for DocumentState {
    fn default() -> Self {
        DocumentState::Pending
    }
}

impl Display for DocumentState {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(DocumentState::Pending),
            "approved" => Ok(DocumentState::Approved),
            "rejected" => Ok(DocumentState::Rejected),
            other => Err(format!("unknown document state: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Created,
    Approved,
    Rejected,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Created => "created",
            AuditAction::Approved => "approved",
            AuditAction::Rejected => "rejected",
        }
    }

    /// Action recorded when a document enters `state`.
    pub fn for_state(state: DocumentState) -> Self {
        match state {
            DocumentState::Pending => AuditAction::Created,
            DocumentState::Approved => AuditAction::Approved,
            DocumentState::Rejected => AuditAction::Rejected,
        }
    }
}

/// One line of a document's audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub at: DateTime<Utc>,
    /// `None` for entries written by the scanner ingestion path.
    pub actor_id: Option<i64>,
    pub action: AuditAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl AuditEntry {
    pub fn new(action: AuditAction, actor_id: Option<i64>, comment: Option<String>) -> Self {
        Self {
            at: Utc::now(),
            actor_id,
            action,
            comment: comment.filter(|c| !c.trim().is_empty()),
        }
    }

    /// Clamp the timestamp so it is strictly after `previous`.
    ///
    /// Two transitions inside the same clock tick would otherwise share a timestamp.
    pub fn after(mut self, previous: Option<&AuditEntry>) -> Self {
        if let Some(previous) = previous {
            if self.at <= previous.at {
                self.at = previous.at + Duration::microseconds(1);
            }
        }
        self
    }

    pub fn render(&self) -> String {
        let actor = match self.actor_id {
            Some(id) => format!("actor {}", id),
            None => "scanner".to_string(),
        };
        match &self.comment {
            Some(comment) => format!(
                "[{}] {} by {}: {}",
                self.at.to_rfc3339(),
                self.action.as_str(),
                actor,
                comment
            ),
            None => format!(
                "[{}] {} by {}",
                self.at.to_rfc3339(),
                self.action.as_str(),
                actor
            ),
        }
    }
}
