//! Authentication handlers
//!
//! Login issues a JWT carrying the identity snapshot; `me` re-reads fresh
//! state and returns the evaluator's verdict for the UI. Both repair the
//! admin-implies-pro invariant opportunistically on read.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::handlers::tenants::TenantSummary;
use crate::AppState;
use noteforge_common::{
    auth::{hash_password, verify_password, AuthContext},
    db::models::{Role, Tenant, User},
    db::Repository,
    entitlement::{self, Entitlement},
    errors::{AppError, Result},
};

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,

    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserProfile,
}

/// User shape returned to clients; never includes the password hash
#[derive(Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    pub is_pro: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pro_cancellation_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pro_cancelled_at: Option<String>,
    pub tenant: TenantSummary,
}

impl UserProfile {
    pub fn from_parts(user: &User, tenant: &Tenant) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            role: user.role.clone(),
            is_pro: user.has_active_pro(),
            pro_cancellation_reason: user.pro_cancellation_reason.clone(),
            pro_cancelled_at: user.pro_cancelled_at.map(|dt| dt.to_rfc3339()),
            tenant: TenantSummary::from_model(tenant),
        }
    }
}

/// Authenticate with email and password
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let repo = Repository::new(state.db.clone());

    // Same error for unknown email and wrong password
    let user = repo
        .find_user_by_email(&request.email)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    if !verify_password(&request.password, &user.password_hash) {
        return Err(AppError::InvalidCredentials);
    }

    let user = repo.ensure_admin_pro(user).await?;

    let tenant = repo
        .find_tenant_by_id(user.tenant_id)
        .await?
        .ok_or_else(|| AppError::TenantNotFound {
            id: user.tenant_id.to_string(),
        })?;

    let token = state.jwt.generate_token(
        user.id,
        &user.email,
        tenant.id,
        &tenant.slug,
        user.role(),
        user.has_active_pro(),
    )?;

    tracing::info!(user_id = %user.id, tenant_id = %tenant.id, "Login successful");

    Ok(Json(LoginResponse {
        token,
        user: UserProfile::from_parts(&user, &tenant),
    }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,

    #[validate(length(min = 1))]
    pub password: String,

    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    pub tenant_id: Uuid,
}

/// Register a new user in the acting admin's tenant (admin only)
pub async fn register(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>)> {
    auth.require_admin()?;

    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let role = match request.role.as_deref() {
        None | Some("member") => Role::Member,
        Some("admin") => Role::Admin,
        Some(other) => {
            return Err(AppError::InvalidFormat {
                message: format!("Unknown role: {}", other),
            })
        }
    };

    let repo = Repository::new(state.db.clone());

    if repo.find_user_by_email(&request.email).await?.is_some() {
        return Err(AppError::DuplicateUser {
            email: request.email.to_lowercase(),
        });
    }

    let password_hash = hash_password(&request.password)?;

    let user = repo
        .create_user(auth.tenant_id, request.email, password_hash, role)
        .await?;

    tracing::info!(
        user_id = %user.id,
        tenant_id = %auth.tenant_id,
        role = %user.role,
        "User registered"
    );

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            id: user.id,
            email: user.email,
            role: user.role,
            tenant_id: user.tenant_id,
        }),
    ))
}

#[derive(Serialize)]
pub struct MeResponse {
    pub user: UserProfile,
    pub entitlement: Entitlement,
}

/// Get the current user's fresh state and entitlement
pub async fn me(State(state): State<AppState>, auth: AuthContext) -> Result<Json<MeResponse>> {
    let repo = Repository::new(state.db.clone());

    let user = repo
        .find_user_by_id(auth.user_id)
        .await?
        .ok_or_else(|| AppError::UserNotFound {
            id: auth.user_id.to_string(),
        })?;

    let user = repo.ensure_admin_pro(user).await?;

    let tenant = repo
        .find_tenant_by_id(user.tenant_id)
        .await?
        .ok_or_else(|| AppError::TenantNotFound {
            id: user.tenant_id.to_string(),
        })?;

    let note_count = repo.count_notes(tenant.id).await?;
    let entitlement = entitlement::evaluate(&tenant, &user, note_count);

    Ok(Json(MeResponse {
        user: UserProfile::from_parts(&user, &tenant),
        entitlement,
    }))
}

#[derive(Debug, Deserialize)]
pub struct UsersQuery {
    pub email: Option<String>,
}

#[derive(Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    pub is_pro: bool,
}

#[derive(Serialize)]
pub struct UsersResponse {
    pub users: Vec<UserSummary>,
}

/// List users in the acting admin's tenant (admin only)
pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<UsersQuery>,
) -> Result<Json<UsersResponse>> {
    auth.require_admin()?;

    let repo = Repository::new(state.db.clone());
    let users = repo
        .list_users(auth.tenant_id, query.email.as_deref())
        .await?;

    Ok(Json(UsersResponse {
        users: users
            .into_iter()
            .map(|u| UserSummary {
                id: u.id,
                email: u.email,
                role: u.role,
                is_pro: u.is_pro,
            })
            .collect(),
    }))
}
