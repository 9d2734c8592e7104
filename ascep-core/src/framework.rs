use sqlx::PgPool;

/// Pool handle that the SQL processors in [`crate::entities`] run against.
#[derive(Debug, Clone)]
pub struct DatabaseProcessor {
    pub pool: PgPool,
}
