use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{NewUser, User};
use crate::db::classify;

const USER_COLUMNS: &str = "id, email, name, password_hash, role, created_at, updated_at";

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn list(&self, limit: i64, offset: i64) -> anyhow::Result<Vec<User>>;
    /// The first account ever created is `admin`, every later one `user`.
    /// The role is decided in the same critical section as the insert.
    async fn create(&self, user: NewUser) -> anyhow::Result<User>;
    /// Persist every mutable column of `user`; `None` if it no longer exists.
    async fn save(&self, user: &User) -> anyhow::Result<Option<User>>;
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;
}

#[derive(Clone)]
pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("find user by id")
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.db)
            .await
            .context("find user by email")
    }

    async fn list(&self, limit: i64, offset: i64) -> anyhow::Result<Vec<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC LIMIT $1 OFFSET $2"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.db)
            .await
            .context("list users")
    }

    async fn create(&self, user: NewUser) -> anyhow::Result<User> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        // Self-conflicting lock: concurrent sign-ups queue here, plain reads do not.
        sqlx::query("LOCK TABLE users IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await
            .context("lock users")?;

        let sql = format!(
            r#"
            INSERT INTO users (email, name, password_hash, role)
            SELECT $1, $2, $3,
                   CASE WHEN EXISTS (SELECT 1 FROM users)
                        THEN 'user'::user_role
                        ELSE 'admin'::user_role
                   END
            RETURNING {USER_COLUMNS}
            "#
        );
        let created = sqlx::query_as::<_, User>(&sql)
            .bind(&user.email)
            .bind(&user.name)
            .bind(&user.password_hash)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| classify(e, "email", "user"))?;

        tx.commit().await.context("commit tx")?;
        Ok(created)
    }

    async fn save(&self, user: &User) -> anyhow::Result<Option<User>> {
        let sql = format!(
            r#"
            UPDATE users
               SET email = $2, name = $3, password_hash = $4, role = $5, updated_at = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(user.id)
            .bind(&user.email)
            .bind(&user.name)
            .bind(&user.password_hash)
            .bind(user.role)
            .fetch_optional(&self.db)
            .await
            .map_err(|e| classify(e, "email", "user"))
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(|e| classify(e, "user", "user still owns projects"))?;
        Ok(res.rows_affected() > 0)
    }
}
