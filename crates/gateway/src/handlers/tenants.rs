//! Tenant management handlers
//!
//! The slug in the path must name the acting admin's own tenant; these
//! endpoints never operate across tenants.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use noteforge_common::{
    auth::AuthContext,
    db::models::Tenant,
    db::Repository,
    errors::{AppError, Result},
    metrics,
    upgrade::UpgradeWorkflow,
};

#[derive(Serialize)]
pub struct TenantSummary {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub plan: String,
    pub note_limit: i64,
}

impl TenantSummary {
    pub fn from_model(tenant: &Tenant) -> Self {
        Self {
            id: tenant.id,
            name: tenant.name.clone(),
            slug: tenant.slug.clone(),
            plan: tenant.plan.clone(),
            note_limit: tenant.note_limit(),
        }
    }
}

fn require_own_tenant(auth: &AuthContext, slug: &str) -> Result<()> {
    auth.require_admin()?;

    if slug != auth.tenant_slug {
        return Err(AppError::Forbidden {
            message: "Access denied to this tenant".to_string(),
        });
    }

    Ok(())
}

/// Upgrade the tenant to the Pro plan (admin only, own tenant)
pub async fn upgrade_tenant(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(slug): Path<String>,
) -> Result<Json<TenantSummary>> {
    require_own_tenant(&auth, &slug)?;

    let repo = Repository::new(state.db.clone());
    let tenant = repo.upgrade_tenant_plan(auth.tenant_id).await?;

    tracing::info!(
        tenant_id = %tenant.id,
        upgraded_by = %auth.user_id,
        "Tenant upgraded to Pro plan"
    );

    Ok(Json(TenantSummary::from_model(&tenant)))
}

/// Get tenant info for invitations (admin only, own tenant)
pub async fn tenant_info(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(slug): Path<String>,
) -> Result<Json<TenantSummary>> {
    require_own_tenant(&auth, &slug)?;

    let repo = Repository::new(state.db.clone());
    let tenant = repo
        .find_tenant_by_id(auth.tenant_id)
        .await?
        .ok_or_else(|| AppError::TenantNotFound {
            id: auth.tenant_id.to_string(),
        })?;

    Ok(Json(TenantSummary::from_model(&tenant)))
}

#[derive(Serialize)]
pub struct ProStatusResponse {
    pub user_id: Uuid,
    pub is_pro: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<String>,
}

/// Grant user-level Pro directly (admin only, own tenant)
pub async fn grant_user_pro(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((slug, user_id)): Path<(String, Uuid)>,
) -> Result<Json<ProStatusResponse>> {
    require_own_tenant(&auth, &slug)?;

    let workflow = UpgradeWorkflow::new(state.db.clone());
    let user = workflow.grant_direct(auth.tenant_id, user_id).await?;

    metrics::record_pro_grant(&auth.tenant_id.to_string(), "grant");

    Ok(Json(ProStatusResponse {
        user_id: user.id,
        is_pro: user.is_pro,
        cancellation_reason: None,
        cancelled_at: None,
    }))
}

#[derive(Debug, Deserialize)]
pub struct RevokeProRequest {
    pub reason: String,
}

/// Revoke user-level Pro (admin only, own tenant). Admins cannot be
/// revoked.
pub async fn revoke_user_pro(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((slug, user_id)): Path<(String, Uuid)>,
    Json(request): Json<RevokeProRequest>,
) -> Result<Json<ProStatusResponse>> {
    require_own_tenant(&auth, &slug)?;

    let workflow = UpgradeWorkflow::new(state.db.clone());
    let user = workflow
        .revoke_direct(auth.tenant_id, auth.user_id, user_id, &request.reason)
        .await?;

    metrics::record_pro_grant(&auth.tenant_id.to_string(), "revoke");

    Ok(Json(ProStatusResponse {
        user_id: user.id,
        is_pro: user.is_pro,
        cancellation_reason: user.pro_cancellation_reason,
        cancelled_at: user.pro_cancelled_at.map(|dt| dt.to_rfc3339()),
    }))
}
