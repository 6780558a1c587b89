pub mod info;
pub mod labelimage;
pub mod prediction;
pub mod raw;
pub mod setup;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/raw/:fmt/roi", get(raw::raw_roi))
        .route("/prediction/:fmt/roi", get(prediction::prediction_roi))
        .route("/labelimage/:fmt/roi", get(labelimage::labelimage_roi))
        .route("/prediction/info/numclasses", get(info::numclasses))
        .route("/raw/info/dtype", get(info::raw_dtype))
        .route("/raw/info/shape", get(info::raw_shape))
        .route("/raw/info/dim", get(info::raw_dim))
        .route("/setup", post(setup::setup))
        .with_state(state)
}
