//! SeaORM entity models
//!
//! Database entities for NoteForge

mod note;
mod tenant;
mod user;

pub use tenant::{
    ActiveModel as TenantActiveModel, Column as TenantColumn, Entity as TenantEntity,
    Model as Tenant, TenantPlan, UpgradeStatus,
};

pub use user::{
    ActiveModel as UserActiveModel, Column as UserColumn, Entity as UserEntity, Model as User,
    Role,
};

pub use note::{
    ActiveModel as NoteActiveModel, Column as NoteColumn, Entity as NoteEntity, Model as Note,
};
