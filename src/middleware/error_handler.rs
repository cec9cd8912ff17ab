use axum::{
    body::{Body, to_bytes},
    http::{Request, header},
    middleware::Next,
    response::Response,
};

// 错误响应体只读取前 4KB 用于日志
const MAX_LOGGED_BODY: usize = 4096;

/// 记录所有 5xx 响应（方法、路径、状态码和响应体）
pub async fn log_errors(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let response = next.run(req).await;

    if !response.status().is_server_error() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, MAX_LOGGED_BODY).await {
        Ok(b) => b,
        Err(e) => {
            tracing::error!(%method, %uri, status = %parts.status, "Failed to read error response body: {}", e);
            return Response::from_parts(parts, Body::empty());
        }
    };

    tracing::error!(
        %method,
        %uri,
        status = %parts.status,
        body = %String::from_utf8_lossy(&bytes),
        "Server error occurred"
    );

    // 重新构建响应体
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(bytes))
}
