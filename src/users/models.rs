use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Row, postgres::PgRow};
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle of a subscription; bank transfers stay `Pending` until confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Pending,
    Active,
    Expired,
}

impl SubscriptionStatus {
    /// Parse the persisted `subscriptions.status` textual value into a typed enum.
    fn from_db(value: &str) -> Result<Self, sqlx::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "expired" => Ok(Self::Expired),
            _ => Err(sqlx::Error::Decode(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("invalid subscriptions.status value: {value}"),
            )))),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Expired => "expired",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Subscription {
    pub id: Uuid,
    pub plan: String,
    pub status: SubscriptionStatus,
    pub created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for Subscription {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        Ok(Self {
            id: row.try_get("id")?,
            plan: row.try_get("plan")?,
            status: SubscriptionStatus::from_db(&status)?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// A member, as stored in the session and returned by the user store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(default)]
    pub subscriptions: Vec<Subscription>,
}

impl User {
    #[must_use]
    pub fn has_active_subscription(&self) -> bool {
        self.subscriptions
            .iter()
            .any(|subscription| subscription.status == SubscriptionStatus::Active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn subscription(status: SubscriptionStatus) -> Subscription {
        Subscription {
            id: Uuid::new_v4(),
            plan: "kelas-rust".to_string(),
            status,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn status_parses_known_values() -> Result<()> {
        for status in [
            SubscriptionStatus::Pending,
            SubscriptionStatus::Active,
            SubscriptionStatus::Expired,
        ] {
            assert_eq!(SubscriptionStatus::from_db(status.as_str())?, status);
        }
        assert!(SubscriptionStatus::from_db("refunded").is_err());
        Ok(())
    }

    #[test]
    fn active_subscription_detection() {
        let mut user = User {
            id: Uuid::new_v4(),
            email: "siti@example.com".to_string(),
            subscriptions: vec![subscription(SubscriptionStatus::Pending)],
        };
        assert!(!user.has_active_subscription());

        user.subscriptions
            .push(subscription(SubscriptionStatus::Active));
        assert!(user.has_active_subscription());
    }

    #[test]
    fn user_without_subscriptions_field_deserializes() -> Result<()> {
        let id = Uuid::new_v4();
        let user: User = serde_json::from_value(serde_json::json!({
            "id": id,
            "email": "budi@example.com",
        }))?;
        assert_eq!(user.id, id);
        assert!(user.subscriptions.is_empty());
        Ok(())
    }
}
