//! Entitlement evaluation
//!
//! Pure decision function combining the two orthogonal Pro signals (tenant
//! plan, per-user override) with role and note count. Callers must pass a
//! fresh state snapshot on every evaluation; nothing here is memoized, and
//! tenant and user records are updated by separate operations that can race
//! a stale snapshot.

use crate::db::models::{Tenant, UpgradeStatus, User};
use crate::FREE_PLAN_NOTE_LIMIT;
use serde::Serialize;

/// The computed rights of one user at one instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Entitlement {
    /// May this user create another note right now?
    pub can_create_note: bool,

    /// May this user submit an upgrade request right now?
    pub can_request_upgrade: bool,

    /// Upgrade-request status reconciled for display
    pub effective_status: UpgradeStatus,
}

/// Evaluate a user's entitlement from a fresh tenant/user snapshot and the
/// tenant's current note count.
pub fn evaluate(tenant: &Tenant, user: &User, tenant_note_count: i64) -> Entitlement {
    Entitlement {
        can_create_note: can_create_note(tenant, user, tenant_note_count),
        can_request_upgrade: can_request_upgrade(tenant, user),
        effective_status: effective_status(tenant, user),
    }
}

/// Note-creation gate, first match wins:
/// 1. admins are always entitled
/// 2. a Pro tenant entitles everyone in it
/// 3. a user-level Pro grant entitles its holder
/// 4. otherwise the tenant-wide free ceiling applies
fn can_create_note(tenant: &Tenant, user: &User, tenant_note_count: i64) -> bool {
    if user.is_admin() {
        return true;
    }
    if tenant.is_pro() {
        return true;
    }
    if user.is_pro {
        return true;
    }
    tenant_note_count < FREE_PLAN_NOTE_LIMIT
}

/// Members of a free tenant without a Pro grant may request an upgrade,
/// unless one is already pending. A past revocation is not a cooldown.
fn can_request_upgrade(tenant: &Tenant, user: &User) -> bool {
    if user.is_admin() {
        return false;
    }
    if tenant.is_pro() || user.is_pro {
        return false;
    }
    tenant.upgrade_status() != UpgradeStatus::Pending
}

/// Reconcile the stored request status for display.
///
/// The stored status can be a stale "approved" (or "rejected") from a past
/// cycle after the user's Pro was later revoked. A pending request is always
/// shown; any other status is shown only while the user is actually
/// entitled, and collapses to `none` otherwise so the user can request
/// again.
fn effective_status(tenant: &Tenant, user: &User) -> UpgradeStatus {
    let stored = tenant.upgrade_status();

    if stored == UpgradeStatus::Pending {
        return stored;
    }
    if tenant.is_pro() || user.is_pro {
        return stored;
    }
    UpgradeStatus::None
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn tenant(plan: &str, status: &str) -> Tenant {
        let now = chrono::Utc::now().into();
        Tenant {
            id: Uuid::new_v4(),
            name: "Acme Corporation".into(),
            slug: "acme".into(),
            plan: plan.into(),
            upgrade_status: status.into(),
            upgrade_requested_by: None,
            upgrade_requested_at: None,
            upgrade_reviewed_by: None,
            upgrade_reviewed_at: None,
            upgrade_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn user(tenant: &Tenant, role: &str, is_pro: bool) -> User {
        let now = chrono::Utc::now().into();
        User {
            id: Uuid::new_v4(),
            tenant_id: tenant.id,
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
    fn test_admin_always_creates() {
        let t = tenant("free", "none");
        // even with a drifted is_pro flag and the tenant at its ceiling
        let admin = user(&t, "admin", false);
        assert!(evaluate(&t, &admin, 100).can_create_note);
    }

    #[test]
    fn test_pro_tenant_entitles_members() {
        let t = tenant("pro", "none");
        let member = user(&t, "member", false);
        assert!(evaluate(&t, &member, 100).can_create_note);
    }

    #[test]
    fn test_user_grant_overrides_free_plan() {
        let t = tenant("free", "none");
        let pro_member = user(&t, "member", true);
        assert!(evaluate(&t, &pro_member, 100).can_create_note);
    }

    #[test]
    fn test_free_member_hits_ceiling() {
        let t = tenant("free", "none");
        let member = user(&t, "member", false);
        assert!(evaluate(&t, &member, 0).can_create_note);
        assert!(evaluate(&t, &member, 2).can_create_note);
        assert!(!evaluate(&t, &member, 3).can_create_note);
        assert!(!evaluate(&t, &member, 4).can_create_note);
    }

    #[test]
    fn test_request_eligibility() {
        let t = tenant("free", "none");
        assert!(evaluate(&t, &user(&t, "member", false), 0).can_request_upgrade);

        // admins never request
        assert!(!evaluate(&t, &user(&t, "admin", true), 0).can_request_upgrade);

        // already entitled users never request
        assert!(!evaluate(&t, &user(&t, "member", true), 0).can_request_upgrade);
        let pro_t = tenant("pro", "none");
        assert!(!evaluate(&pro_t, &user(&pro_t, "member", false), 0).can_request_upgrade);

        // a pending request blocks another
        let pending_t = tenant("free", "pending");
        assert!(!evaluate(&pending_t, &user(&pending_t, "member", false), 0).can_request_upgrade);
    }

    #[test]
    fn test_cancellation_is_not_a_cooldown() {
        let t = tenant("free", "approved");
        let mut revoked = user(&t, "member", false);
        revoked.pro_cancellation_reason = Some("policy violation".into());
        revoked.pro_cancelled_at = Some(chrono::Utc::now().into());

        assert!(evaluate(&t, &revoked, 0).can_request_upgrade);
    }

    #[test]
    fn test_stale_approved_suppressed_for_unentitled_member() {
        // approved last cycle, Pro since revoked: show none so the user
        // can request again
        let t = tenant("free", "approved");
        let member = user(&t, "member", false);
        assert_eq!(evaluate(&t, &member, 0).effective_status, UpgradeStatus::None);
    }

    #[test]
    fn test_approved_kept_while_entitled() {
        let t = tenant("free", "approved");
        let pro_member = user(&t, "member", true);
        assert_eq!(
            evaluate(&t, &pro_member, 0).effective_status,
            UpgradeStatus::Approved
        );

        let pro_t = tenant("pro", "approved");
        let member = user(&pro_t, "member", false);
        assert_eq!(
            evaluate(&pro_t, &member, 0).effective_status,
            UpgradeStatus::Approved
        );
    }

    #[test]
    fn test_pending_always_shown() {
        let t = tenant("free", "pending");
        let member = user(&t, "member", false);
        assert_eq!(
            evaluate(&t, &member, 0).effective_status,
            UpgradeStatus::Pending
        );
    }

    #[test]
    fn test_rejected_collapses_for_unentitled_member() {
        let t = tenant("free", "rejected");
        let member = user(&t, "member", false);
        assert_eq!(evaluate(&t, &member, 0).effective_status, UpgradeStatus::None);
    }
}
