//! Upgrade request handlers
//!
//! The request/approve/reject cycle runs through the workflow engine; the
//! status endpoint reports the evaluator-reconciled view rather than the
//! raw stored status.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::AppState;
use noteforge_common::{
    auth::AuthContext,
    db::models::UpgradeStatus,
    db::Repository,
    entitlement,
    errors::{AppError, Result},
    metrics,
    upgrade::UpgradeWorkflow,
};

#[derive(Debug, Deserialize)]
pub struct UpgradeRequestBody {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Serialize)]
pub struct RequestUpgradeResponse {
    pub status: UpgradeStatus,
    pub requested_at: Option<String>,
    pub reason: Option<String>,
}

/// Submit an upgrade request for the caller's tenant
pub async fn request_upgrade(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<UpgradeRequestBody>,
) -> Result<Json<RequestUpgradeResponse>> {
    let workflow = UpgradeWorkflow::new(state.db.clone());
    let tenant = workflow
        .request(auth.tenant_id, auth.user_id, request.reason)
        .await?;

    metrics::record_upgrade_request(&auth.tenant_id.to_string());

    Ok(Json(RequestUpgradeResponse {
        status: tenant.upgrade_status(),
        requested_at: tenant.upgrade_requested_at.map(|dt| dt.to_rfc3339()),
        reason: tenant.upgrade_reason,
    }))
}

#[derive(Serialize)]
pub struct UpgradeStatusResponse {
    pub status: UpgradeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub can_request_upgrade: bool,
}

/// Get the caller tenant's upgrade request status, reconciled for display
pub async fn upgrade_status(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<UpgradeStatusResponse>> {
    let repo = Repository::new(state.db.clone());

    let tenant = repo
        .find_tenant_by_id(auth.tenant_id)
        .await?
        .ok_or_else(|| AppError::TenantNotFound {
            id: auth.tenant_id.to_string(),
        })?;

    let user = repo
        .find_user_by_id(auth.user_id)
        .await?
        .ok_or_else(|| AppError::UserNotFound {
            id: auth.user_id.to_string(),
        })?;

    let note_count = repo.count_notes(tenant.id).await?;
    let verdict = entitlement::evaluate(&tenant, &user, note_count);

    // A collapsed status hides the metadata of the past cycle with it
    if verdict.effective_status == UpgradeStatus::None {
        return Ok(Json(UpgradeStatusResponse {
            status: UpgradeStatus::None,
            requested_by: None,
            requested_at: None,
            reviewed_by: None,
            reviewed_at: None,
            reason: None,
            can_request_upgrade: verdict.can_request_upgrade,
        }));
    }

    let requested_by = match tenant.upgrade_requested_by {
        Some(id) => repo.find_user_by_id(id).await?.map(|u| u.email),
        None => None,
    };
    let reviewed_by = match tenant.upgrade_reviewed_by {
        Some(id) => repo.find_user_by_id(id).await?.map(|u| u.email),
        None => None,
    };

    Ok(Json(UpgradeStatusResponse {
        status: verdict.effective_status,
        requested_by,
        requested_at: tenant.upgrade_requested_at.map(|dt| dt.to_rfc3339()),
        reviewed_by,
        reviewed_at: tenant.upgrade_reviewed_at.map(|dt| dt.to_rfc3339()),
        reason: tenant.upgrade_reason,
        can_request_upgrade: verdict.can_request_upgrade,
    }))
}

#[derive(Serialize)]
pub struct PendingUpgradeSummary {
    pub tenant_id: Uuid,
    pub name: String,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Serialize)]
pub struct PendingUpgradesResponse {
    pub pending: Vec<PendingUpgradeSummary>,
}

/// List all tenants with a pending upgrade request (admin only).
/// Read-only and cross-tenant: this is the review queue overview.
pub async fn list_pending(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<PendingUpgradesResponse>> {
    auth.require_admin()?;

    let repo = Repository::new(state.db.clone());
    let tenants = repo.list_pending_upgrade_tenants().await?;

    let requester_ids: Vec<Uuid> = tenants
        .iter()
        .filter_map(|t| t.upgrade_requested_by)
        .collect();
    let emails: HashMap<Uuid, String> = repo
        .find_users_by_ids(requester_ids)
        .await?
        .into_iter()
        .map(|u| (u.id, u.email))
        .collect();

    let pending = tenants
        .into_iter()
        .map(|t| PendingUpgradeSummary {
            tenant_id: t.id,
            name: t.name,
            slug: t.slug,
            requested_by: t
                .upgrade_requested_by
                .and_then(|id| emails.get(&id).cloned()),
            requested_at: t.upgrade_requested_at.map(|dt| dt.to_rfc3339()),
            reason: t.upgrade_reason,
        })
        .collect();

    Ok(Json(PendingUpgradesResponse { pending }))
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Serialize)]
pub struct ReviewedUser {
    pub id: Uuid,
    pub email: String,
    pub is_pro: bool,
}

#[derive(Serialize)]
pub struct ApproveResponse {
    pub tenant_id: Uuid,
    pub tenant_name: String,
    pub status: UpgradeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<ReviewedUser>,
}

/// Approve a pending upgrade request (admin only, own tenant)
pub async fn approve_upgrade(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(tenant_id): Path<Uuid>,
    Json(request): Json<ReviewRequest>,
) -> Result<Json<ApproveResponse>> {
    auth.require_admin()?;
    auth.require_tenant(tenant_id)?;

    let workflow = UpgradeWorkflow::new(state.db.clone());
    let outcome = workflow
        .approve(tenant_id, auth.user_id, request.reason)
        .await?;

    if outcome.newly_approved {
        metrics::record_upgrade_review(&tenant_id.to_string(), "approved");
    }

    Ok(Json(ApproveResponse {
        tenant_id: outcome.tenant.id,
        tenant_name: outcome.tenant.name.clone(),
        status: outcome.tenant.upgrade_status(),
        approved_at: outcome.tenant.upgrade_reviewed_at.map(|dt| dt.to_rfc3339()),
        user: outcome.requester.map(|u| ReviewedUser {
            id: u.id,
            email: u.email,
            is_pro: u.is_pro,
        }),
    }))
}

#[derive(Serialize)]
pub struct RejectResponse {
    pub tenant_id: Uuid,
    pub tenant_name: String,
    pub status: UpgradeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Reject a pending upgrade request (admin only, own tenant)
pub async fn reject_upgrade(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(tenant_id): Path<Uuid>,
    Json(request): Json<ReviewRequest>,
) -> Result<Json<RejectResponse>> {
    auth.require_admin()?;
    auth.require_tenant(tenant_id)?;

    let workflow = UpgradeWorkflow::new(state.db.clone());
    let tenant = workflow
        .reject(tenant_id, auth.user_id, request.reason)
        .await?;

    metrics::record_upgrade_review(&tenant_id.to_string(), "rejected");

    Ok(Json(RejectResponse {
        tenant_id: tenant.id,
        tenant_name: tenant.name.clone(),
        status: tenant.upgrade_status(),
        rejected_at: tenant.upgrade_reviewed_at.map(|dt| dt.to_rfc3339()),
        reason: tenant.upgrade_reason,
    }))
}
