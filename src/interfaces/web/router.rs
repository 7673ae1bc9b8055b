use axum::{
    Router,
    http::Method,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;

use super::AppState;
use super::handlers::{generate, keys, schedule, video, youtube};

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(tower_http::cors::Any)
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/generate-content", post(generate::generate_content))
        .route("/split-out-tweets", post(generate::split_out_tweets))
        .route("/process-video", post(video::process_video))
        .route("/upload-to-youtube", post(video::upload_to_youtube))
        .route("/schedule-post", post(schedule::schedule_post))
        .route("/post-to-list", post(schedule::post_to_list))
        .route("/encrypt_key", post(keys::encrypt_key))
        .route("/authorize-youtube", get(youtube::authorize))
        .route("/oauth2callback", get(youtube::callback))
        .layer(build_cors())
        .with_state(state)
}
