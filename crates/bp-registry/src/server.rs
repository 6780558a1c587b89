//! HTTP surface for the registry service (internal, not part of the §6
//! public surface — consumed only by the other services in this pipeline).

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use bp_types::{RegistryKey, RegistryValue};
use serde::Deserialize;

use crate::store::{RegistryError, RegistryStore};

pub fn router(store: Arc<RegistryStore>) -> Router {
    Router::new()
        .route("/registry/log", post(log_entry))
        .route("/registry/:key/remove", post(remove_value))
        .route("/registry/:key", get(get_value).post(set_value))
        .with_state(store)
}

fn parse_key(raw: &str) -> Result<RegistryKey, (StatusCode, String)> {
    RegistryKey::parse(raw).ok_or((StatusCode::BAD_REQUEST, format!("unknown registry key: {raw}")))
}

async fn get_value(Path(key): Path<String>, State(store): State<Arc<RegistryStore>>) -> impl IntoResponse {
    let key = match parse_key(&key) {
        Ok(k) => k,
        Err(e) => return e.into_response(),
    };
    match store.get(key) {
        Some(v) => Json(v).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn set_value(
    Path(key): Path<String>,
    State(store): State<Arc<RegistryStore>>,
    Json(value): Json<RegistryValue>,
) -> impl IntoResponse {
    let key = match parse_key(&key) {
        Ok(k) => k,
        Err(e) => return e.into_response(),
    };
    match store.set(key, value) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(RegistryError::UnknownKey(msg)) => (StatusCode::BAD_REQUEST, msg).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

#[derive(Deserialize)]
struct RemoveBody {
    value: String,
}

async fn remove_value(
    Path(key): Path<String>,
    State(store): State<Arc<RegistryStore>>,
    Json(body): Json<RemoveBody>,
) -> impl IntoResponse {
    let key = match parse_key(&key) {
        Ok(k) => k,
        Err(e) => return e.into_response(),
    };
    match store.remove(key, &body.value) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(RegistryError::RemoveNotSupported(k)) => {
            (StatusCode::BAD_REQUEST, format!("remove not supported for {k:?}")).into_response()
        }
        Err(RegistryError::NotFound(v)) => (StatusCode::NOT_FOUND, v).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

#[derive(Deserialize)]
struct LogBody {
    level: String,
    service_id: String,
    message: String,
}

async fn log_entry(State(store): State<Arc<RegistryStore>>, Json(body): Json<LogBody>) -> impl IntoResponse {
    store.log(&body.level, &body.service_id, &body.message);
    StatusCode::NO_CONTENT
}
