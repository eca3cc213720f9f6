pub mod routes;

use crate::errors::EngineError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

/// Engine error rendered as `{"error": "..."}` with a matching status code.
pub struct ApiError(pub EngineError);

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            EngineError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            EngineError::InsufficientData(_) => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::DataSource(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(error = %self.0, status = %status, "request failed");
        }
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

pub fn router(state: std::sync::Arc<crate::state::AppState>) -> axum::Router {
    axum::Router::new()
        .route("/api/quote", axum::routing::get(routes::get_quote))
        .route("/api/history", axum::routing::get(routes::get_history))
        .route("/api/volatility", axum::routing::get(routes::get_volatility))
        .route("/api/predict/stock", axum::routing::get(routes::predict_stock))
        .route("/api/predict/option", axum::routing::get(routes::predict_option))
        .route("/api/predict/signal", axum::routing::get(routes::predict_signal))
        .route(
            "/api/tickers",
            axum::routing::get(routes::get_tickers).post(routes::add_tickers),
        )
        .route("/api/counters", axum::routing::get(routes::get_counters))
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (EngineError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (EngineError::InsufficientData("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (EngineError::DataSource("x".into()), StatusCode::BAD_GATEWAY),
            (EngineError::Model("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).status(), status);
        }
    }
}
