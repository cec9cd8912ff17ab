use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::utils::{ApiResponse, error_codes};

/// 错误分类：只有瞬时错误才会被重试
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Transient,
    Permanent,
}

pub trait Classify {
    fn class(&self) -> ErrorClass;

    fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }
}

/// 存储层统一错误
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("already exists")]
    AlreadyExists,
    /// 保存时版本号不匹配（文档已被其他请求修改）
    #[error("version conflict")]
    Conflict,
    #[error("transient backend failure: {0}")]
    Transient(String),
    #[error("backend error: {0}")]
    Permanent(String),
}

impl Classify for StoreError {
    fn class(&self) -> ErrorClass {
        match self {
            StoreError::Conflict | StoreError::Transient(_) => ErrorClass::Transient,
            StoreError::NotFound | StoreError::AlreadyExists | StoreError::Permanent(_) => {
                ErrorClass::Permanent
            }
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::WorkerCrashed => {
                StoreError::Transient(e.to_string())
            }
            sqlx::Error::Database(ref db) if db.code().as_deref() == Some("23505") => {
                StoreError::AlreadyExists
            }
            other => StoreError::Permanent(other.to_string()),
        }
    }
}

/// 加入/退出/分班过程中的致命错误，直接向调用方传播
#[derive(Debug, Error)]
pub enum MembershipError {
    #[error("class group {0} not found")]
    GroupNotFound(String),
    #[error("user {0} not found")]
    UserNotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Classify for MembershipError {
    fn class(&self) -> ErrorClass {
        match self {
            MembershipError::Store(e) => e.class(),
            MembershipError::GroupNotFound(_) | MembershipError::UserNotFound(_) => {
                ErrorClass::Permanent
            }
        }
    }
}

#[derive(Debug)]
pub enum AppError {
    Unauthorized,
    NotFound(String),
    InternalServerError,
}

impl From<MembershipError> for AppError {
    fn from(e: MembershipError) -> Self {
        match e {
            MembershipError::GroupNotFound(_) | MembershipError::UserNotFound(_) => {
                AppError::NotFound(e.to_string())
            }
            MembershipError::Store(err) => {
                tracing::error!("Membership store error: {}", err);
                AppError::InternalServerError
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, msg) = match self {
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                error_codes::AUTH_FAILED,
                "未授权访问".to_string(),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, error_codes::NOT_FOUND, msg),
            AppError::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_codes::INTERNAL_ERROR,
                "内部服务器错误".to_string(),
            ),
        };

        let body = Json(ApiResponse::<()> {
            code,
            msg,
            resp_data: None,
        });

        (status, body).into_response()
    }
}
