use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Action that produced a notification. Serialized as its human label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationVerb {
    #[serde(rename = "liked your post")]
    LikedPost,
    #[serde(rename = "commented on your post")]
    CommentedOnPost,
    #[serde(rename = "started following you")]
    Followed,
}

impl NotificationVerb {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationVerb::LikedPost => "liked your post",
            NotificationVerb::CommentedOnPost => "commented on your post",
            NotificationVerb::Followed => "started following you",
        }
    }
}

impl TryFrom<&str> for NotificationVerb {
    type Error = AppError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "liked your post" => Ok(NotificationVerb::LikedPost),
            "commented on your post" => Ok(NotificationVerb::CommentedOnPost),
            "started following you" => Ok(NotificationVerb::Followed),
            other => Err(AppError::Internal(format!(
                "unknown notification verb '{}'",
                other
            ))),
        }
    }
}

/// Typed reference to the object a notification is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum NotificationTarget {
    Post(i64),
    Comment(i64),
}

impl NotificationTarget {
    pub fn kind(&self) -> &'static str {
        match self {
            NotificationTarget::Post(_) => "post",
            NotificationTarget::Comment(_) => "comment",
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            NotificationTarget::Post(id) | NotificationTarget::Comment(id) => *id,
        }
    }

    pub fn from_parts(kind: Option<&str>, id: Option<i64>) -> Result<Option<Self>, AppError> {
        match (kind, id) {
            (Some("post"), Some(id)) => Ok(Some(NotificationTarget::Post(id))),
            (Some("comment"), Some(id)) => Ok(Some(NotificationTarget::Comment(id))),
            (None, None) => Ok(None),
            (kind, id) => Err(AppError::Internal(format!(
                "malformed notification target ({:?}, {:?})",
                kind, id
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: i64,
    pub recipient_id: i64,
    pub actor_id: i64,
    pub verb: NotificationVerb,
    pub target: Option<NotificationTarget>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub recipient_id: i64,
    pub actor_id: i64,
    pub verb: NotificationVerb,
    pub target: Option<NotificationTarget>,
    pub created_at: DateTime<Utc>,
}

/// Flat row shape used by the SQL backend.
#[derive(Debug, sqlx::FromRow)]
pub struct NotificationRow {
    pub id: i64,
    pub recipient_id: i64,
    pub actor_id: i64,
    pub verb: String,
    pub target_kind: Option<String>,
    pub target_id: Option<i64>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = AppError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        Ok(Notification {
            id: row.id,
            recipient_id: row.recipient_id,
            actor_id: row.actor_id,
            verb: NotificationVerb::try_from(row.verb.as_str())?,
            target: NotificationTarget::from_parts(row.target_kind.as_deref(), row.target_id)?,
            is_read: row.is_read,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TargetSummary {
    pub kind: String,
    pub id: i64,
    pub display: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationResponse {
    pub id: i64,
    pub actor: i64,
    pub actor_username: Option<String>,
    pub verb: NotificationVerb,
    pub read: bool,
    pub timestamp: DateTime<Utc>,
    pub target: Option<TargetSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verb_serializes_as_label() {
        let json = serde_json::to_string(&NotificationVerb::LikedPost).unwrap();
        assert_eq!(json, "\"liked your post\"");
        assert_eq!(
            NotificationVerb::try_from("started following you").unwrap(),
            NotificationVerb::Followed
        );
        assert!(NotificationVerb::try_from("poked you").is_err());
    }

    #[test]
    fn target_parts() {
        assert_eq!(
            NotificationTarget::from_parts(Some("post"), Some(4)).unwrap(),
            Some(NotificationTarget::Post(4))
        );
        assert_eq!(NotificationTarget::from_parts(None, None).unwrap(), None);
        assert!(NotificationTarget::from_parts(Some("post"), None).is_err());
    }
}
