pub(crate) use super::AppState;
pub(crate) use crate::error::ServiceError;
pub(crate) use axum::Json;
pub(crate) use axum::extract::rejection::JsonRejection;
pub(crate) use axum::extract::{Query, State};
pub(crate) use axum::http::{HeaderValue, StatusCode, header::CONTENT_TYPE};
pub(crate) use axum::response::IntoResponse;
pub(crate) use serde::Deserialize;
pub(crate) use serde_json::{Value, json};
pub(crate) use tracing::{debug, info};
