use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    AppState,
    membership::UserInfo,
    utils::{error_codes, error_to_api_response, generate_token, success_to_api_response},
};

use super::model::{
    LoginRequest, LoginResponse, RegisterRequest, RegisterResponse, User, is_valid_user_id,
};

#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> impl IntoResponse {
    if !is_valid_user_id(&req.user_id) {
        return (
            StatusCode::BAD_REQUEST,
            error_to_api_response(
                error_codes::VALIDATION_ERROR,
                "用户ID格式无效，只允许使用字母、数字和下划线".to_string(),
            ),
        );
    }

    let user = match User::create(&state.pool, &req).await {
        Ok(user) => user,
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            return (
                StatusCode::CONFLICT,
                error_to_api_response(error_codes::USER_EXISTS, "用户已存在".to_string()),
            );
        }
        Err(e) => {
            tracing::error!("Failed to create user: {:?}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, "创建用户失败".to_string()),
            );
        }
    };

    let (token, expires_at) = match generate_token(&user.user_id, &state.config) {
        Ok(token) => token,
        Err(e) => {
            tracing::error!("Failed to generate token: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, "生成令牌失败".to_string()),
            );
        }
    };

    // 分班失败只作为警告返回，不影响注册结果
    let info = UserInfo {
        nickname: user.nickname.clone(),
        email: user.email.clone(),
    };
    let (class_group, warning) = match state
        .membership
        .assign(&user.user_id, req.graduation_year, &info)
        .await
    {
        Ok(result) if result.success => (result.assigned_group, None),
        Ok(result) => (None, result.error.or(Some(result.message))),
        Err(e) => {
            tracing::error!(user_id = %user.user_id, error = %e, "class group assignment aborted");
            (None, Some(e.to_string()))
        }
    };

    (
        StatusCode::CREATED,
        success_to_api_response(RegisterResponse {
            user_id: user.user_id,
            nickname: user.nickname,
            token,
            expires_at,
            class_group,
            warning,
        }),
    )
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> impl IntoResponse {
    let user = match User::find_by_id(&state.pool, &req.user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                error_to_api_response(error_codes::NOT_FOUND, "用户不存在".to_string()),
            );
        }
        Err(e) => {
            tracing::error!("Database error: {:?}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, "数据库错误".to_string()),
            );
        }
    };

    match user.verify_login(&req.password) {
        Ok(true) => {}
        Ok(false) => {
            return (
                StatusCode::UNAUTHORIZED,
                error_to_api_response(error_codes::AUTH_FAILED, "密码错误".to_string()),
            );
        }
        Err(e) => {
            tracing::error!("Password verification error: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, "密码验证失败".to_string()),
            );
        }
    }

    match generate_token(&user.user_id, &state.config) {
        Ok((token, expires_at)) => (
            StatusCode::OK,
            success_to_api_response(LoginResponse {
                user_id: user.user_id,
                token,
                expires_at,
            }),
        ),
        Err(e) => {
            tracing::error!("Failed to generate token: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, "生成令牌失败".to_string()),
            )
        }
    }
}
