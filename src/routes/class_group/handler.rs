use axum::{
    Extension,
    extract::{Json, State},
    http::StatusCode,
};

use crate::AppState;
use crate::error::AppError;
use crate::utils::Claims;

use super::model::{MembershipRequest, MembershipResponse};

#[axum::debug_handler]
pub async fn join_group(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<MembershipRequest>,
) -> Result<(StatusCode, Json<MembershipResponse>), AppError> {
    let outcome = state.membership.join(&claims.sub, &req.group_id).await?;
    let (status, body) = MembershipResponse::from_join(outcome);
    Ok((status, Json(body)))
}

#[axum::debug_handler]
pub async fn leave_group(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<MembershipRequest>,
) -> Result<(StatusCode, Json<MembershipResponse>), AppError> {
    let outcome = state.membership.leave(&claims.sub, &req.group_id).await?;
    let (status, body) = MembershipResponse::from_leave(outcome);
    Ok((status, Json(body)))
}
