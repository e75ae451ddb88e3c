use sqlx::{Pool, Postgres};

use crate::jwt::SessionKeys;

/// Shared handles every request needs.
#[derive(Clone)]
pub struct Context {
    pub pool: Pool<Postgres>,
    pub sessions: SessionKeys,
}

impl Context {
    pub fn new(pool: Pool<Postgres>, sessions: SessionKeys) -> Self {
        Self { pool, sessions }
    }
}
