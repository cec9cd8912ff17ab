use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::membership::GroupSummary;
use crate::utils::{hash_password, verify_password};

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct User {
    pub user_id: String,
    pub nickname: String,
    pub email: Option<String>,
    pub graduation_year: Option<i32>,
    #[serde(skip_serializing)]
    pub password_hash: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub user_id: String,
    pub password: String,
    pub nickname: String,
    pub email: Option<String>,
    pub graduation_year: i32,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: String,
    pub nickname: String,
    pub token: String,
    pub expires_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_group: Option<GroupSummary>,
    /// 自动分班失败时的提示，注册本身仍然成功
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub user_id: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: String,
    pub token: String,
    pub expires_at: i64,
}

impl User {
    pub async fn create(pool: &PgPool, req: &RegisterRequest) -> Result<Self, sqlx::Error> {
        let password_hash = hash_password(&req.password)
            .map_err(|e| sqlx::Error::Protocol(format!("Failed to hash password: {}", e)))?;

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (user_id, nickname, email, password_hash, graduation_year)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING user_id, nickname, email, graduation_year, password_hash
            "#,
        )
        .bind(&req.user_id)
        .bind(&req.nickname)
        .bind(&req.email)
        .bind(password_hash)
        .bind(req.graduation_year)
        .fetch_one(pool)
        .await?;

        tracing::info!("Created user: {}", user.user_id);
        Ok(user)
    }

    pub async fn find_by_id(pool: &PgPool, user_id: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT user_id, nickname, email, graduation_year, password_hash
            FROM users
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    pub fn verify_login(&self, password: &str) -> Result<bool, bcrypt::BcryptError> {
        verify_password(password, &self.password_hash)
    }
}

/// 用户ID只允许字母、数字和下划线
pub(super) fn is_valid_user_id(user_id: &str) -> bool {
    !user_id.is_empty() && user_id.chars().all(|c| c.is_alphanumeric() || c == '_')
}
