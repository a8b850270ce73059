//! Upgrade workflow engine
//!
//! State machine over a tenant's single upgrade-request slot:
//! `none -> pending -> {approved, rejected} -> none`. Neither resolution is
//! terminal; a resolved slot can be claimed again by a fresh request.
//!
//! The precondition checks are pure functions over a state snapshot; the
//! engine persists the transitions. Two hazards are handled here rather
//! than left to callers:
//! - claiming the pending slot is a single guarded UPDATE, so two
//!   concurrent requests cannot both record themselves as requester;
//! - approval mutates both the requester and the tenant inside one
//!   database transaction, with the tenant row guarded on `pending`.

use crate::db::models::{
    Tenant, TenantColumn, TenantEntity, TenantPlan, UpgradeStatus, User, UserActiveModel,
    UserColumn, UserEntity,
};
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use crate::DEFAULT_UPGRADE_REASON;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait,
};
use uuid::Uuid;

/// Result of an approval, carrying what changed
#[derive(Debug, Clone)]
pub struct ApprovalOutcome {
    pub tenant: Tenant,

    /// The requester that was granted Pro; None when the approval was an
    /// idempotent retry of an already-approved request.
    pub requester: Option<User>,

    pub newly_approved: bool,
}

/// How a review operation should treat the tenant's current state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReviewDisposition {
    /// A pending request exists and should be resolved
    Pending,

    /// Already approved; re-approval is a no-op, not an error
    AlreadyApproved,
}

/// A request may claim the slot only on a free tenant with no request in
/// flight.
fn check_request(tenant: &Tenant) -> Result<()> {
    if tenant.is_pro() {
        return Err(AppError::AlreadyPro);
    }
    if tenant.upgrade_status() == UpgradeStatus::Pending {
        return Err(AppError::UpgradeAlreadyPending);
    }
    Ok(())
}

fn review_disposition(tenant: &Tenant) -> Result<ReviewDisposition> {
    match tenant.upgrade_status() {
        UpgradeStatus::Pending => Ok(ReviewDisposition::Pending),
        UpgradeStatus::Approved => Ok(ReviewDisposition::AlreadyApproved),
        _ => Err(AppError::NoPendingRequest),
    }
}

/// Rejection has no idempotent retry case: only `pending` may be rejected.
fn check_reject(tenant: &Tenant) -> Result<()> {
    match tenant.upgrade_status() {
        UpgradeStatus::Pending => Ok(()),
        _ => Err(AppError::NoPendingRequest),
    }
}

/// Revocation requires a reason and never touches admins.
fn check_revoke(target: &User, reason: &str) -> Result<()> {
    if reason.trim().is_empty() {
        return Err(AppError::MissingField {
            field: "reason".to_string(),
        });
    }
    if target.is_admin() {
        return Err(AppError::TargetIsAdmin);
    }
    Ok(())
}

/// Engine executing upgrade-workflow transitions against the database
#[derive(Clone)]
pub struct UpgradeWorkflow {
    pool: DbPool,
}

impl UpgradeWorkflow {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Submit an upgrade request for a tenant.
    ///
    /// The `none/approved/rejected -> pending` transition is one guarded
    /// UPDATE; of two concurrent requests exactly one claims the slot.
    pub async fn request(
        &self,
        tenant_id: Uuid,
        requested_by: Uuid,
        reason: Option<String>,
    ) -> Result<Tenant> {
        let conn = self.pool.write();

        let tenant = TenantEntity::find_by_id(tenant_id)
            .one(conn)
            .await?
            .ok_or_else(|| AppError::TenantNotFound {
                id: tenant_id.to_string(),
            })?;

        check_request(&tenant)?;

        let now: DateTimeWithTimeZone = chrono::Utc::now().into();
        let reason = reason
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_UPGRADE_REASON.to_string());

        let result = TenantEntity::update_many()
            .col_expr(
                TenantColumn::UpgradeStatus,
                Expr::value(String::from(UpgradeStatus::Pending)),
            )
            .col_expr(TenantColumn::UpgradeRequestedBy, Expr::value(requested_by))
            .col_expr(TenantColumn::UpgradeRequestedAt, Expr::value(now))
            .col_expr(
                TenantColumn::UpgradeReviewedBy,
                Expr::value(Option::<Uuid>::None),
            )
            .col_expr(
                TenantColumn::UpgradeReviewedAt,
                Expr::value(Option::<DateTimeWithTimeZone>::None),
            )
            .col_expr(TenantColumn::UpgradeReason, Expr::value(reason))
            .col_expr(TenantColumn::UpdatedAt, Expr::value(now))
            .filter(TenantColumn::Id.eq(tenant_id))
            .filter(TenantColumn::Plan.eq(String::from(TenantPlan::Free)))
            .filter(TenantColumn::UpgradeStatus.ne(String::from(UpgradeStatus::Pending)))
            .exec(conn)
            .await?;

        if result.rows_affected == 0 {
            // Lost a race since the snapshot; re-diagnose against fresh state
            let fresh = TenantEntity::find_by_id(tenant_id)
                .one(conn)
                .await?
                .ok_or_else(|| AppError::TenantNotFound {
                    id: tenant_id.to_string(),
                })?;
            check_request(&fresh)?;
            return Err(AppError::UpgradeAlreadyPending);
        }

        let tenant = TenantEntity::find_by_id(tenant_id)
            .one(conn)
            .await?
            .ok_or_else(|| AppError::TenantNotFound {
                id: tenant_id.to_string(),
            })?;

        tracing::info!(
            tenant_id = %tenant_id,
            requested_by = %requested_by,
            "Upgrade request submitted"
        );

        Ok(tenant)
    }

    /// Approve a tenant's pending upgrade request.
    ///
    /// Grants Pro to the original requester (not the reviewer) and clears
    /// their cancellation history, then resolves the tenant slot - both in
    /// one transaction. Re-approving an already-approved tenant is a no-op
    /// success so a retry after a partial failure converges.
    pub async fn approve(
        &self,
        tenant_id: Uuid,
        reviewed_by: Uuid,
        reason: Option<String>,
    ) -> Result<ApprovalOutcome> {
        let txn = self.pool.write().begin().await?;

        let tenant = TenantEntity::find_by_id(tenant_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::TenantNotFound {
                id: tenant_id.to_string(),
            })?;

        match review_disposition(&tenant)? {
            ReviewDisposition::AlreadyApproved => {
                txn.commit().await?;
                return Ok(ApprovalOutcome {
                    tenant,
                    requester: None,
                    newly_approved: false,
                });
            }
            ReviewDisposition::Pending => {}
        }

        let requester_id = tenant
            .upgrade_requested_by
            .ok_or(AppError::RequesterMissing)?;

        let requester = UserEntity::find()
            .filter(UserColumn::Id.eq(requester_id))
            .filter(UserColumn::TenantId.eq(tenant_id))
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::UserNotFound {
                id: requester_id.to_string(),
            })?;

        let now: DateTimeWithTimeZone = chrono::Utc::now().into();

        let mut grant: UserActiveModel = requester.into();
        grant.is_pro = Set(true);
        grant.pro_cancellation_reason = Set(None);
        grant.pro_cancelled_at = Set(None);
        grant.pro_cancelled_by = Set(None);
        grant.updated_at = Set(now);
        let requester = grant.update(&txn).await?;

        let mut update = TenantEntity::update_many()
            .col_expr(
                TenantColumn::UpgradeStatus,
                Expr::value(String::from(UpgradeStatus::Approved)),
            )
            .col_expr(TenantColumn::UpgradeReviewedBy, Expr::value(reviewed_by))
            .col_expr(TenantColumn::UpgradeReviewedAt, Expr::value(now))
            .col_expr(TenantColumn::UpdatedAt, Expr::value(now))
            .filter(TenantColumn::Id.eq(tenant_id))
            .filter(TenantColumn::UpgradeStatus.eq(String::from(UpgradeStatus::Pending)));

        if let Some(reason) = reason.filter(|r| !r.trim().is_empty()) {
            update = update.col_expr(TenantColumn::UpgradeReason, Expr::value(reason));
        }

        let result = update.exec(&txn).await?;
        if result.rows_affected == 0 {
            // A concurrent reviewer resolved the slot first; dropping the
            // transaction rolls the grant back.
            return Err(AppError::NoPendingRequest);
        }

        let tenant = TenantEntity::find_by_id(tenant_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::TenantNotFound {
                id: tenant_id.to_string(),
            })?;

        txn.commit().await?;

        tracing::info!(
            tenant_id = %tenant_id,
            requester_id = %requester.id,
            reviewed_by = %reviewed_by,
            "Upgrade request approved; requester granted Pro"
        );

        Ok(ApprovalOutcome {
            tenant,
            requester: Some(requester),
            newly_approved: true,
        })
    }

    /// Reject a tenant's pending upgrade request. No user mutation.
    pub async fn reject(
        &self,
        tenant_id: Uuid,
        reviewed_by: Uuid,
        reason: Option<String>,
    ) -> Result<Tenant> {
        let conn = self.pool.write();

        let tenant = TenantEntity::find_by_id(tenant_id)
            .one(conn)
            .await?
            .ok_or_else(|| AppError::TenantNotFound {
                id: tenant_id.to_string(),
            })?;

        check_reject(&tenant)?;

        let now: DateTimeWithTimeZone = chrono::Utc::now().into();

        let mut update = TenantEntity::update_many()
            .col_expr(
                TenantColumn::UpgradeStatus,
                Expr::value(String::from(UpgradeStatus::Rejected)),
            )
            .col_expr(TenantColumn::UpgradeReviewedBy, Expr::value(reviewed_by))
            .col_expr(TenantColumn::UpgradeReviewedAt, Expr::value(now))
            .col_expr(TenantColumn::UpdatedAt, Expr::value(now))
            .filter(TenantColumn::Id.eq(tenant_id))
            .filter(TenantColumn::UpgradeStatus.eq(String::from(UpgradeStatus::Pending)));

        if let Some(reason) = reason.filter(|r| !r.trim().is_empty()) {
            update = update.col_expr(TenantColumn::UpgradeReason, Expr::value(reason));
        }

        let result = update.exec(conn).await?;
        if result.rows_affected == 0 {
            return Err(AppError::NoPendingRequest);
        }

        let tenant = TenantEntity::find_by_id(tenant_id)
            .one(conn)
            .await?
            .ok_or_else(|| AppError::TenantNotFound {
                id: tenant_id.to_string(),
            })?;

        tracing::info!(
            tenant_id = %tenant_id,
            reviewed_by = %reviewed_by,
            "Upgrade request rejected"
        );

        Ok(tenant)
    }

    /// Grant user-level Pro directly, bypassing the request cycle.
    /// Clears any cancellation history. Available in any request state.
    pub async fn grant_direct(&self, acting_tenant: Uuid, target_user_id: Uuid) -> Result<User> {
        let conn = self.pool.write();

        let target = UserEntity::find_by_id(target_user_id)
            .one(conn)
            .await?
            .ok_or_else(|| AppError::UserNotFound {
                id: target_user_id.to_string(),
            })?;

        if target.tenant_id != acting_tenant {
            return Err(AppError::TenantMismatch);
        }

        let mut active: UserActiveModel = target.into();
        active.is_pro = Set(true);
        active.pro_cancellation_reason = Set(None);
        active.pro_cancelled_at = Set(None);
        active.pro_cancelled_by = Set(None);
        active.updated_at = Set(chrono::Utc::now().into());
        let target = active.update(conn).await?;

        tracing::info!(
            tenant_id = %acting_tenant,
            user_id = %target.id,
            "User granted Pro directly"
        );

        Ok(target)
    }

    /// Revoke user-level Pro, recording who revoked it and why.
    /// Admins cannot be revoked; the admin-implies-pro invariant wins.
    pub async fn revoke_direct(
        &self,
        acting_tenant: Uuid,
        acting_admin: Uuid,
        target_user_id: Uuid,
        reason: &str,
    ) -> Result<User> {
        let conn = self.pool.write();

        let target = UserEntity::find_by_id(target_user_id)
            .one(conn)
            .await?
            .ok_or_else(|| AppError::UserNotFound {
                id: target_user_id.to_string(),
            })?;

        if target.tenant_id != acting_tenant {
            return Err(AppError::TenantMismatch);
        }

        check_revoke(&target, reason)?;

        let now: DateTimeWithTimeZone = chrono::Utc::now().into();

        let mut active: UserActiveModel = target.into();
        active.is_pro = Set(false);
        active.pro_cancellation_reason = Set(Some(reason.trim().to_string()));
        active.pro_cancelled_at = Set(Some(now));
        active.pro_cancelled_by = Set(Some(acting_admin));
        active.updated_at = Set(now);
        let target = active.update(conn).await?;

        tracing::info!(
            tenant_id = %acting_tenant,
            user_id = %target.id,
            revoked_by = %acting_admin,
            "User Pro status revoked"
        );

        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entitlement::evaluate;
    use crate::FREE_PLAN_NOTE_LIMIT;

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
    fn test_request_blocked_on_pro_tenant() {
        let t = tenant("pro", "none");
        assert!(matches!(check_request(&t), Err(AppError::AlreadyPro)));
    }

    #[test]
    fn test_request_blocked_while_pending() {
        let t = tenant("free", "pending");
        assert!(matches!(
            check_request(&t),
            Err(AppError::UpgradeAlreadyPending)
        ));
    }

    #[test]
    fn test_request_allowed_after_resolution() {
        // both resolutions free the slot; there is no terminal state
        assert!(check_request(&tenant("free", "none")).is_ok());
        assert!(check_request(&tenant("free", "approved")).is_ok());
        assert!(check_request(&tenant("free", "rejected")).is_ok());
    }

    #[test]
    fn test_review_requires_pending() {
        assert!(matches!(
            review_disposition(&tenant("free", "none")),
            Err(AppError::NoPendingRequest)
        ));
        assert!(matches!(
            review_disposition(&tenant("free", "rejected")),
            Err(AppError::NoPendingRequest)
        ));
        assert_eq!(
            review_disposition(&tenant("free", "pending")).unwrap(),
            ReviewDisposition::Pending
        );
    }

    #[test]
    fn test_reapprove_is_noop_not_error() {
        assert_eq!(
            review_disposition(&tenant("free", "approved")).unwrap(),
            ReviewDisposition::AlreadyApproved
        );
    }

    #[test]
    fn test_reject_has_no_idempotent_retry() {
        assert!(check_reject(&tenant("free", "pending")).is_ok());
        assert!(matches!(
            check_reject(&tenant("free", "approved")),
            Err(AppError::NoPendingRequest)
        ));
    }

    #[test]
    fn test_revoke_refuses_admin_target() {
        let t = tenant("free", "none");
        let admin = user(&t, "admin", true);
        assert!(matches!(
            check_revoke(&admin, "test"),
            Err(AppError::TargetIsAdmin)
        ));
    }

    #[test]
    fn test_revoke_requires_reason() {
        let t = tenant("free", "none");
        let member = user(&t, "member", true);
        assert!(matches!(
            check_revoke(&member, ""),
            Err(AppError::MissingField { .. })
        ));
        assert!(matches!(
            check_revoke(&member, "   "),
            Err(AppError::MissingField { .. })
        ));
        assert!(check_revoke(&member, "policy violation").is_ok());
    }

    /// Full cycle at the state level: ceiling hit, request, approve,
    /// requester entitled again.
    #[test]
    fn test_request_approve_cycle_restores_entitlement() {
        let mut t = tenant("free", "none");
        let mut member = user(&t, "member", false);
        let admin = user(&t, "admin", true);

        // free member at the ceiling
        assert!(!evaluate(&t, &member, FREE_PLAN_NOTE_LIMIT).can_create_note);
        assert!(evaluate(&t, &member, FREE_PLAN_NOTE_LIMIT).can_request_upgrade);

        // request claims the slot
        check_request(&t).unwrap();
        t.upgrade_status = String::from(UpgradeStatus::Pending);
        t.upgrade_requested_by = Some(member.id);
        assert!(!evaluate(&t, &member, FREE_PLAN_NOTE_LIMIT).can_request_upgrade);

        // approval grants the requester, resolves the slot
        assert_eq!(
            review_disposition(&t).unwrap(),
            ReviewDisposition::Pending
        );
        member.is_pro = true;
        t.upgrade_status = String::from(UpgradeStatus::Approved);
        t.upgrade_reviewed_by = Some(admin.id);

        let after = evaluate(&t, &member, FREE_PLAN_NOTE_LIMIT);
        assert!(after.can_create_note);
        assert!(!after.can_request_upgrade);
        assert_eq!(after.effective_status, UpgradeStatus::Approved);
    }
}
