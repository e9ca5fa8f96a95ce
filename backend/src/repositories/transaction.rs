//! Transaction helpers for the PostgreSQL adapter.

use anyhow::Context;
use sqlx::postgres::PgTransaction;
use sqlx::PgPool;

/// Begin a new database transaction.
///
/// Everything written through the handle becomes visible only after
/// [`commit_transaction`]. Dropping the handle rolls back.
pub async fn begin_transaction(db: &PgPool) -> anyhow::Result<PgTransaction<'_>> {
    db.begin().await.context("begin transaction")
}

pub async fn commit_transaction(tx: PgTransaction<'_>) -> anyhow::Result<()> {
    tx.commit().await.context("commit transaction")
}
