use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct Response {
    unstable_features: UnstableFeatures,
    versions: Vec<String>,
}

#[derive(Serialize)]
struct UnstableFeatures;

pub async fn versions() -> Json<Response> {
    let response = Response {
        unstable_features: UnstableFeatures,
        versions: vec![String::from("1")],
    };

    Json(response)
}
