//! Authorization collaborator. The coordination core only asks whether an
//! identity administers the group that owns a ride.

use std::collections::HashSet;
use std::sync::RwLock;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::Instrument;

use crate::types::{GroupId, UserId};

/// Organization roles that may manage rides.
pub const ADMIN_ROLES: [&str; 3] = ["founder", "co_founder", "admin"];

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccessPolicy: Send + Sync {
    async fn is_group_admin(&self, group_id: GroupId, identity_id: UserId)
        -> anyhow::Result<bool>;
}

/// Admin set held in memory. Used without a database and in tests.
#[derive(Debug, Default)]
pub struct StaticAccessPolicy {
    admins: RwLock<HashSet<(GroupId, UserId)>>,
}

impl StaticAccessPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_admin(self, group_id: GroupId, identity_id: UserId) -> Self {
        self.grant(group_id, identity_id);
        self
    }

    pub fn grant(&self, group_id: GroupId, identity_id: UserId) {
        self.admins
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert((group_id, identity_id));
    }
}

#[async_trait]
impl AccessPolicy for StaticAccessPolicy {
    async fn is_group_admin(
        &self,
        group_id: GroupId,
        identity_id: UserId,
    ) -> anyhow::Result<bool> {
        Ok(self
            .admins
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&(group_id, identity_id)))
    }
}

/// Reads admin membership from the organization tables owned by the
/// surrounding system.
#[derive(Debug, Clone)]
pub struct PgAccessPolicy {
    pool: PgPool,
}

impl PgAccessPolicy {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccessPolicy for PgAccessPolicy {
    async fn is_group_admin(
        &self,
        group_id: GroupId,
        identity_id: UserId,
    ) -> anyhow::Result<bool> {
        let roles: Vec<String> = ADMIN_ROLES.iter().map(|r| r.to_string()).collect();
        let is_admin: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM organization_members \
             WHERE organization_id = $1 AND user_id = $2 \
             AND role = ANY($3) AND is_active = TRUE)",
        )
        .bind(group_id)
        .bind(identity_id)
        .bind(&roles)
        .fetch_one(&self.pool)
        .instrument(tracing::debug_span!("pg_is_group_admin", %group_id, %identity_id))
        .await?;
        Ok(is_admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_policy_scopes_admins_to_group() {
        let group = GroupId::new();
        let admin = UserId::new();
        let policy = StaticAccessPolicy::new().with_admin(group, admin);

        assert!(policy.is_group_admin(group, admin).await.unwrap());
        assert!(!policy.is_group_admin(GroupId::new(), admin).await.unwrap());
        assert!(!policy.is_group_admin(group, UserId::new()).await.unwrap());
    }
}
