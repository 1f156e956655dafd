//! Admin PIN check.
//!
//! A shared secret gate for the admin dashboard, not real authentication:
//! no endpoint other than the login check itself looks at it.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::error::json_rejection;
use crate::protocol::AdminLoginRequest;

#[derive(Debug, Clone)]
pub struct AdminPin {
    pin: String,
}

impl AdminPin {
    pub fn new(pin: impl Into<String>) -> Self {
        Self { pin: pin.into() }
    }

    pub fn validate(&self, candidate: &str) -> bool {
        constant_time_eq(self.pin.as_bytes(), candidate.trim().as_bytes())
    }
}

/// Constant-time byte comparison to prevent timing attacks
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// POST /api/admin/login
pub async fn admin_login(
    State(pin): State<Arc<AdminPin>>,
    body: Result<Json<AdminLoginRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(body) => body,
        Err(rejection) => return json_rejection(rejection),
    };

    if pin.validate(&req.pin) {
        tracing::info!("Admin logged in");
        (StatusCode::OK, Json(json!({ "success": true }))).into_response()
    } else {
        tracing::warn!("Rejected admin login with incorrect PIN");
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Incorrect PIN" })),
        )
            .into_response()
    }
}
