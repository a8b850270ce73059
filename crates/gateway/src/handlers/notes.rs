//! Note management handlers
//!
//! Creation goes through the access gate: tenant and user state are
//! re-read on every attempt, and the free-plan ceiling is enforced by an
//! atomic counted insert rather than a separate read-then-write.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use noteforge_common::{
    auth::AuthContext,
    db::models::Note,
    db::Repository,
    errors::{AppError, Result},
    metrics,
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateNoteRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,

    #[validate(length(min = 1, max = 50000))]
    pub content: String,
}

#[derive(Serialize)]
pub struct NoteResponse {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub created_by: Uuid,
    pub created_at: String,
    pub updated_at: String,
}

impl NoteResponse {
    fn from_model(note: Note) -> Self {
        Self {
            id: note.id,
            title: note.title,
            content: note.content,
            created_by: note.created_by,
            created_at: note.created_at.to_rfc3339(),
            updated_at: note.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
pub struct NotesResponse {
    pub notes: Vec<NoteResponse>,
    pub count: usize,
}

/// List all notes for the current tenant, newest first
pub async fn list_notes(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<NotesResponse>> {
    let repo = Repository::new(state.db.clone());
    let notes = repo.list_notes(auth.tenant_id).await?;

    let notes: Vec<NoteResponse> = notes.into_iter().map(NoteResponse::from_model).collect();
    let count = notes.len();

    Ok(Json(NotesResponse { notes, count }))
}

/// Create a new note, subject to the entitlement gate
pub async fn create_note(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<CreateNoteRequest>,
) -> Result<(StatusCode, Json<NoteResponse>)> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let repo = Repository::new(state.db.clone());

    // Fresh state on every attempt; the token's snapshot may be stale
    let user = repo
        .find_user_by_id(auth.user_id)
        .await?
        .ok_or_else(|| AppError::UserNotFound {
            id: auth.user_id.to_string(),
        })?;

    let tenant = repo
        .find_tenant_by_id(auth.tenant_id)
        .await?
        .ok_or_else(|| AppError::TenantNotFound {
            id: auth.tenant_id.to_string(),
        })?;

    let note = if user.is_admin() || tenant.is_pro() || user.is_pro {
        repo.create_note(tenant.id, user.id, request.title, request.content)
            .await?
    } else {
        let limit = tenant.note_limit();
        match repo
            .create_note_within_limit(tenant.id, user.id, request.title, request.content, limit)
            .await?
        {
            Some(note) => note,
            None => {
                let current = repo.count_notes(tenant.id).await?;
                metrics::record_note_limit_rejection(&tenant.id.to_string());

                tracing::info!(
                    tenant_id = %tenant.id,
                    user_id = %user.id,
                    current,
                    limit,
                    "Note creation rejected by free-plan ceiling"
                );

                return Err(AppError::NoteLimitReached { limit, current });
            }
        }
    };

    metrics::record_note_created(&tenant.id.to_string());

    tracing::info!(
        note_id = %note.id,
        tenant_id = %tenant.id,
        user_id = %user.id,
        "Note created"
    );

    Ok((StatusCode::CREATED, Json(NoteResponse::from_model(note))))
}

/// Get a specific note
pub async fn get_note(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(note_id): Path<Uuid>,
) -> Result<Json<NoteResponse>> {
    let repo = Repository::new(state.db.clone());

    let note = repo
        .find_note(auth.tenant_id, note_id)
        .await?
        .ok_or_else(|| AppError::NoteNotFound {
            id: note_id.to_string(),
        })?;

    Ok(Json(NoteResponse::from_model(note)))
}

/// Update a note's title and content
pub async fn update_note(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(note_id): Path<Uuid>,
    Json(request): Json<CreateNoteRequest>,
) -> Result<Json<NoteResponse>> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let repo = Repository::new(state.db.clone());

    let note = repo
        .update_note(auth.tenant_id, note_id, request.title, request.content)
        .await?
        .ok_or_else(|| AppError::NoteNotFound {
            id: note_id.to_string(),
        })?;

    Ok(Json(NoteResponse::from_model(note)))
}

/// Delete a note
pub async fn delete_note(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(note_id): Path<Uuid>,
) -> Result<StatusCode> {
    let repo = Repository::new(state.db.clone());

    if !repo.delete_note(auth.tenant_id, note_id).await? {
        return Err(AppError::NoteNotFound {
            id: note_id.to_string(),
        });
    }

    tracing::info!(
        note_id = %note_id,
        tenant_id = %auth.tenant_id,
        "Note deleted"
    );

    Ok(StatusCode::NO_CONTENT)
}
