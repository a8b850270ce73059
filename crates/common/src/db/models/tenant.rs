//! Tenant entity
//!
//! A tenant owns its plan and a single in-flight upgrade request,
//! flattened onto the row so the pending slot can be claimed with one
//! compare-and-set update.

use crate::FREE_PLAN_NOTE_LIMIT;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Tenant-wide subscription tier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantPlan {
    Free,
    Pro,
}

impl From<String> for TenantPlan {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pro" => TenantPlan::Pro,
            _ => TenantPlan::Free,
        }
    }
}

impl From<TenantPlan> for String {
    fn from(plan: TenantPlan) -> Self {
        match plan {
            TenantPlan::Free => "free".to_string(),
            TenantPlan::Pro => "pro".to_string(),
        }
    }
}

/// Upgrade request status enum
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeStatus {
    None,
    Pending,
    Approved,
    Rejected,
}

impl From<String> for UpgradeStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pending" => UpgradeStatus::Pending,
            "approved" => UpgradeStatus::Approved,
            "rejected" => UpgradeStatus::Rejected,
            _ => UpgradeStatus::None,
        }
    }
}

impl From<UpgradeStatus> for String {
    fn from(status: UpgradeStatus) -> Self {
        match status {
            UpgradeStatus::None => "none".to_string(),
            UpgradeStatus::Pending => "pending".to_string(),
            UpgradeStatus::Approved => "approved".to_string(),
            UpgradeStatus::Rejected => "rejected".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tenants")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub name: String,

    #[sea_orm(column_type = "Text", unique)]
    pub slug: String,

    #[sea_orm(column_type = "Text")]
    pub plan: String,

    #[sea_orm(column_type = "Text")]
    pub upgrade_status: String,

    pub upgrade_requested_by: Option<Uuid>,

    pub upgrade_requested_at: Option<DateTimeWithTimeZone>,

    pub upgrade_reviewed_by: Option<Uuid>,

    pub upgrade_reviewed_at: Option<DateTimeWithTimeZone>,

    #[sea_orm(column_type = "Text", nullable)]
    pub upgrade_reason: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Get the plan as an enum
    pub fn plan(&self) -> TenantPlan {
        TenantPlan::from(self.plan.clone())
    }

    /// Get the upgrade request status as an enum
    pub fn upgrade_status(&self) -> UpgradeStatus {
        UpgradeStatus::from(self.upgrade_status.clone())
    }

    pub fn is_pro(&self) -> bool {
        self.plan() == TenantPlan::Pro
    }

    /// Note ceiling for this tenant. -1 means unlimited. Derived from the
    /// plan rather than stored, so the two can never disagree.
    pub fn note_limit(&self) -> i64 {
        if self.is_pro() {
            -1
        } else {
            FREE_PLAN_NOTE_LIMIT
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::user::Entity")]
    Users,

    #[sea_orm(has_many = "super::note::Entity")]
    Notes,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::note::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Notes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant(plan: &str) -> Model {
        let now = chrono::Utc::now().into();
        Model {
            id: Uuid::new_v4(),
            name: "Acme Corporation".into(),
            slug: "acme".into(),
            plan: plan.into(),
            upgrade_status: "none".into(),
            upgrade_requested_by: None,
            upgrade_requested_at: None,
            upgrade_reviewed_by: None,
            upgrade_reviewed_at: None,
            upgrade_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_note_limit_tracks_plan() {
        assert_eq!(tenant("free").note_limit(), 3);
        assert_eq!(tenant("pro").note_limit(), -1);
        // unknown plan strings fall back to free
        assert_eq!(tenant("enterprise").note_limit(), 3);
    }

    #[test]
    fn test_status_roundtrip() {
        for status in ["none", "pending", "approved", "rejected"] {
            let parsed = UpgradeStatus::from(status.to_string());
            assert_eq!(String::from(parsed), status);
        }
        assert_eq!(UpgradeStatus::from("garbage".to_string()), UpgradeStatus::None);
    }
}
