//! User entity
//!
//! A user's Pro flag is an override independent of the tenant plan; the
//! entitlement evaluator combines the two. Admins are always Pro.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Closed set of user roles
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Member,
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        match s.as_str() {
            "admin" => Role::Admin,
            _ => Role::Member,
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Admin => "admin".to_string(),
            Role::Member => "member".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub tenant_id: Uuid,

    #[sea_orm(column_type = "Text", unique)]
    pub email: String,

    #[sea_orm(column_type = "Text")]
    #[serde(skip_serializing)]
    pub password_hash: String,

    #[sea_orm(column_type = "Text")]
    pub role: String,

    pub is_pro: bool,

    #[sea_orm(column_type = "Text", nullable)]
    pub pro_cancellation_reason: Option<String>,

    pub pro_cancelled_at: Option<DateTimeWithTimeZone>,

    pub pro_cancelled_by: Option<Uuid>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Get the role as an enum
    pub fn role(&self) -> Role {
        Role::from(self.role.clone())
    }

    pub fn is_admin(&self) -> bool {
        self.role() == Role::Admin
    }

    /// Whether the user currently holds a user-level Pro grant. Admins
    /// count as Pro even if the stored flag has drifted; the stored value
    /// is repaired opportunistically on login and profile reads.
    pub fn has_active_pro(&self) -> bool {
        self.is_pro || self.is_admin()
    }

    /// Invariant check: `role = admin` implies `is_pro = true`
    pub fn admin_pro_consistent(&self) -> bool {
        !self.is_admin() || self.is_pro
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tenant::Entity",
        from = "Column::TenantId",
        to = "super::tenant::Column::Id"
    )]
    Tenant,

    #[sea_orm(has_many = "super::note::Entity")]
    Notes,
}

impl Related<super::tenant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tenant.def()
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

    fn user(role: &str, is_pro: bool) -> Model {
        let now = chrono::Utc::now().into();
        Model {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            email: "user@acme.test".into(),
            password_hash: "x".into(),
            role: role.into(),
            is_pro,
            pro_cancellation_reason: None,
            pro_cancelled_at: None,
            pro_cancelled_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!(user("admin", true).role(), Role::Admin);
        assert_eq!(user("member", false).role(), Role::Member);
        // unknown role strings demote to member
        assert_eq!(user("owner", false).role(), Role::Member);
    }

    #[test]
    fn test_admin_counts_as_pro_even_when_flag_drifted() {
        let drifted = user("admin", false);
        assert!(drifted.has_active_pro());
        assert!(!drifted.admin_pro_consistent());
        assert!(user("admin", true).admin_pro_consistent());
    }

    #[test]
    fn test_member_pro_follows_flag() {
        assert!(user("member", true).has_active_pro());
        assert!(!user("member", false).has_active_pro());
    }
}
