//! CRM domain services.
//!
//! Every service takes a sea-orm connection and returns [`ApiResult`], so the
//! HTTP layer only has to extract inputs and serialize outputs. Records are
//! always scoped to their owner; a row that belongs to someone else is
//! reported exactly like a missing one.

pub mod accounts;
pub mod contacts;
pub mod deals;
pub mod listing;
pub mod screening;
pub mod seed;
pub mod tickets;
pub mod validate;

pub use listing::{ListQuery, Page, PageNumber};

use chrono::Utc;
use platform_api::{ApiError, ApiResult};
use sea_orm::{DbErr, SqlErr, prelude::DateTimeWithTimeZone};
use uuid::Uuid;

pub(crate) fn db_error(err: DbErr) -> ApiError {
    if let Some(SqlErr::UniqueConstraintViolation(detail)) = err.sql_err() {
        tracing::debug!(%detail, "unique constraint violated");
        return ApiError::Conflict("record already exists".into());
    }
    ApiError::internal(anyhow::Error::new(err).context("database error"))
}

pub(crate) fn now() -> DateTimeWithTimeZone {
    Utc::now().into()
}

/// Parses a client-supplied id, reporting a bad one against `field`.
pub(crate) fn parse_id(field: &str, raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::field(field, "must be a valid id"))
}

#[cfg(test)]
pub(crate) mod testing {
    use migration::{Migrator, MigratorTrait};
    use sea_orm::{ConnectOptions, Database, DatabaseConnection};

    use crate::accounts::{self, RegisterInput};
    use entity::user;

    pub async fn db() -> DatabaseConnection {
        let mut options = ConnectOptions::new("sqlite::memory:");
        options.max_connections(1).sqlx_logging(false);
        let db = Database::connect(options).await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        db
    }

    pub async fn user(db: &DatabaseConnection, name: &str) -> user::Model {
        let view = accounts::register(
            db,
            RegisterInput {
                username: name.into(),
                email: format!("{name}@example.com"),
                password: "secret123".into(),
                confirm_password: None,
            },
        )
        .await
        .unwrap();
        accounts::find_user(db, view.id).await.unwrap()
    }
}
