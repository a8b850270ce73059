//! Repository pattern for database operations
//!
//! Provides a clean interface for all data access operations with proper
//! error handling. Tenant scoping is applied here, not in handlers: every
//! query that can be scoped takes the owning tenant id.

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, Statement, TransactionTrait,
};
use uuid::Uuid;

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // Tenant Operations
    // ========================================================================

    /// Find tenant by ID
    pub async fn find_tenant_by_id(&self, id: Uuid) -> Result<Option<Tenant>> {
        TenantEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Find tenant by slug
    pub async fn find_tenant_by_slug(&self, slug: &str) -> Result<Option<Tenant>> {
        TenantEntity::find()
            .filter(TenantColumn::Slug.eq(slug.to_lowercase()))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Upgrade a tenant to the Pro plan (direct admin action)
    pub async fn upgrade_tenant_plan(&self, tenant_id: Uuid) -> Result<Tenant> {
        let tenant = TenantEntity::find_by_id(tenant_id)
            .one(self.write_conn())
            .await?
            .ok_or_else(|| AppError::TenantNotFound {
                id: tenant_id.to_string(),
            })?;

        let mut active: TenantActiveModel = tenant.into();
        active.plan = Set(String::from(TenantPlan::Pro));
        active.updated_at = Set(chrono::Utc::now().into());

        active.update(self.write_conn()).await.map_err(Into::into)
    }

    /// List all tenants with a pending upgrade request, oldest first.
    /// Cross-tenant by design: this feeds the admin review queue.
    pub async fn list_pending_upgrade_tenants(&self) -> Result<Vec<Tenant>> {
        TenantEntity::find()
            .filter(TenantColumn::UpgradeStatus.eq(String::from(UpgradeStatus::Pending)))
            .order_by_asc(TenantColumn::UpgradeRequestedAt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // User Operations
    // ========================================================================

    /// Find user by ID
    pub async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        UserEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Find user by email (emails are stored lowercased)
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        UserEntity::find()
            .filter(UserColumn::Email.eq(email.to_lowercase()))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Find a user that belongs to the given tenant
    pub async fn find_user_in_tenant(&self, user_id: Uuid, tenant_id: Uuid) -> Result<Option<User>> {
        UserEntity::find()
            .filter(UserColumn::Id.eq(user_id))
            .filter(UserColumn::TenantId.eq(tenant_id))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// List users in a tenant, optionally filtered by exact email
    pub async fn list_users(&self, tenant_id: Uuid, email: Option<&str>) -> Result<Vec<User>> {
        let mut query = UserEntity::find().filter(UserColumn::TenantId.eq(tenant_id));

        if let Some(email) = email {
            query = query.filter(UserColumn::Email.eq(email.to_lowercase()));
        }

        query
            .order_by_asc(UserColumn::Email)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Fetch users by id set (for joining requester emails onto summaries)
    pub async fn find_users_by_ids(&self, ids: Vec<Uuid>) -> Result<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        UserEntity::find()
            .filter(UserColumn::Id.is_in(ids))
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Create a new user in a tenant. Admins are created Pro.
    pub async fn create_user(
        &self,
        tenant_id: Uuid,
        email: String,
        password_hash: String,
        role: Role,
    ) -> Result<User> {
        let now = chrono::Utc::now();

        let user = UserActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(tenant_id),
            email: Set(email.to_lowercase()),
            password_hash: Set(password_hash),
            role: Set(String::from(role)),
            is_pro: Set(role == Role::Admin),
            pro_cancellation_reason: Set(None),
            pro_cancelled_at: Set(None),
            pro_cancelled_by: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        user.insert(self.write_conn()).await.map_err(Into::into)
    }

    /// Repair the admin-implies-pro invariant on a freshly read user.
    /// Admins whose Pro flag has drifted false are written back true.
    pub async fn ensure_admin_pro(&self, user: User) -> Result<User> {
        if user.admin_pro_consistent() {
            return Ok(user);
        }

        tracing::warn!(user_id = %user.id, "Repairing admin user with is_pro = false");

        let mut active: UserActiveModel = user.into();
        active.is_pro = Set(true);
        active.updated_at = Set(chrono::Utc::now().into());

        active.update(self.write_conn()).await.map_err(Into::into)
    }

    // ========================================================================
    // Note Operations
    // ========================================================================

    /// Count notes in a tenant
    pub async fn count_notes(&self, tenant_id: Uuid) -> Result<i64> {
        NoteEntity::find()
            .filter(NoteColumn::TenantId.eq(tenant_id))
            .count(self.read_conn())
            .await
            .map(|n| n as i64)
            .map_err(Into::into)
    }

    /// Create a note without a ceiling (entitled users)
    pub async fn create_note(
        &self,
        tenant_id: Uuid,
        created_by: Uuid,
        title: String,
        content: String,
    ) -> Result<Note> {
        let now = chrono::Utc::now();

        let note = NoteActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(tenant_id),
            created_by: Set(created_by),
            title: Set(title),
            content: Set(content),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        note.insert(self.write_conn()).await.map_err(Into::into)
    }

    /// Create a note only if the tenant is still under its ceiling.
    ///
    /// The count and the insert must observe the same state, so the whole
    /// operation runs in one transaction holding a per-tenant advisory
    /// lock. Returns None when the ceiling was hit.
    pub async fn create_note_within_limit(
        &self,
        tenant_id: Uuid,
        created_by: Uuid,
        title: String,
        content: String,
        limit: i64,
    ) -> Result<Option<Note>> {
        let note_id = Uuid::new_v4();
        let now = chrono::Utc::now();

        let txn = self.write_conn().begin().await?;

        let lock = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))",
            vec![tenant_id.into()],
        );
        txn.execute(lock).await?;

        let insert = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            INSERT INTO notes (id, tenant_id, created_by, title, content, created_at, updated_at)
            SELECT $1, $2, $3, $4, $5, $6, $6
            WHERE (SELECT COUNT(*) FROM notes WHERE tenant_id = $2) < $7
            "#,
            vec![
                note_id.into(),
                tenant_id.into(),
                created_by.into(),
                title.into(),
                content.into(),
                now.into(),
                limit.into(),
            ],
        );

        let result = txn.execute(insert).await?;
        txn.commit().await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        let note = NoteEntity::find_by_id(note_id)
            .one(self.write_conn())
            .await?
            .ok_or_else(|| AppError::Internal {
                message: "Inserted note not found on readback".to_string(),
            })?;

        Ok(Some(note))
    }

    /// List notes in a tenant, newest first
    pub async fn list_notes(&self, tenant_id: Uuid) -> Result<Vec<Note>> {
        NoteEntity::find()
            .filter(NoteColumn::TenantId.eq(tenant_id))
            .order_by_desc(NoteColumn::CreatedAt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Find a note within a tenant. An id owned by another tenant is
    /// indistinguishable from a missing one.
    pub async fn find_note(&self, tenant_id: Uuid, note_id: Uuid) -> Result<Option<Note>> {
        NoteEntity::find()
            .filter(NoteColumn::Id.eq(note_id))
            .filter(NoteColumn::TenantId.eq(tenant_id))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Update a note's title and content within a tenant
    pub async fn update_note(
        &self,
        tenant_id: Uuid,
        note_id: Uuid,
        title: String,
        content: String,
    ) -> Result<Option<Note>> {
        let Some(note) = NoteEntity::find()
            .filter(NoteColumn::Id.eq(note_id))
            .filter(NoteColumn::TenantId.eq(tenant_id))
            .one(self.write_conn())
            .await?
        else {
            return Ok(None);
        };

        let mut active: NoteActiveModel = note.into();
        active.title = Set(title);
        active.content = Set(content);
        active.updated_at = Set(chrono::Utc::now().into());

        active.update(self.write_conn()).await.map(Some).map_err(Into::into)
    }

    /// Delete a note within a tenant, returning whether anything was removed
    pub async fn delete_note(&self, tenant_id: Uuid, note_id: Uuid) -> Result<bool> {
        let result = NoteEntity::delete_many()
            .filter(NoteColumn::Id.eq(note_id))
            .filter(NoteColumn::TenantId.eq(tenant_id))
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected > 0)
    }
}
