//! REST surface over the Controller's accessors, built with `axum`.
//! Handlers only call existing Controller accessors/mutators; they never
//! touch a pixel buffer directly.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::canvas::Canvas;
use crate::controller::Controller;
use crate::error::Error;
use crate::feature::Feature;

/// Builds the router. CORS is left to the caller (the original source's
/// `WebServer` sets `Access-Control-Allow-Origin: *` unconditionally; a
/// production deployment should scope that with `tower-http::cors`).
pub fn router(controller: Arc<Controller>) -> Router {
    Router::new()
        .route("/api/controller", get(get_controller))
        .route("/api/canvases", get(list_canvases).post(create_canvas))
        .route(
            "/api/canvases/:id",
            get(get_canvas).put(update_canvas).delete(delete_canvas),
        )
        .route("/api/canvases/:id/features", get(list_features).post(create_feature))
        .route(
            "/api/canvases/:id/features/:feature_id",
            get(get_feature).put(update_feature).delete(delete_feature),
        )
        .route("/api/sockets", get(list_sockets))
        .route("/api/sockets/:host", get(get_socket))
        .with_state(controller)
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidArgument(_) | Error::Configuration(_) => StatusCode::BAD_REQUEST,
            Error::Protocol(_) | Error::Io(_) | Error::Overflow(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Serialize)]
struct ControllerSummary {
    canvases: Vec<crate::controller::CanvasSummary>,
}

async fn get_controller(State(controller): State<Arc<Controller>>) -> Json<serde_json::Value> {
    let canvases = controller.canvases_summary().await;
    Json(serde_json::json!({ "controller": ControllerSummary { canvases } }))
}

async fn list_canvases(State(controller): State<Arc<Controller>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "canvases": controller.canvases_summary().await }))
}

#[derive(Deserialize)]
struct CreateCanvasRequest {
    id: i64,
    name: String,
    width: u32,
    height: u32,
    #[serde(default = "default_fps")]
    fps: u32,
}

fn default_fps() -> u32 {
    30
}

async fn create_canvas(
    State(controller): State<Arc<Controller>>,
    Json(request): Json<CreateCanvasRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), Error> {
    let id = if request.id == -1 {
        controller
            .create_canvas(&request.name, request.width, request.height, request.fps)
            .await?
    } else {
        controller
            .add_canvas(Canvas::new(request.id, request.name, request.width, request.height, request.fps))
            .await?
    };
    let summary = controller.canvas_summary(id).await?;
    Ok((StatusCode::CREATED, Json(serde_json::to_value(summary).unwrap())))
}

async fn get_canvas(
    State(controller): State<Arc<Controller>>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, Error> {
    let summary = controller.canvas_summary(id).await?;
    Ok(Json(serde_json::json!({ "canvas": summary })))
}

#[derive(Deserialize)]
struct UpdateCanvasRequest {
    name: String,
    width: u32,
    height: u32,
    #[serde(default = "default_fps")]
    fps: u32,
}

async fn update_canvas(
    State(controller): State<Arc<Controller>>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateCanvasRequest>,
) -> Result<Json<serde_json::Value>, Error> {
    controller
        .update_canvas(id, &request.name, request.width, request.height, request.fps)
        .await?;
    let summary = controller.canvas_summary(id).await?;
    Ok(Json(serde_json::json!({ "canvas": summary })))
}

async fn delete_canvas(State(controller): State<Arc<Controller>>, Path(id): Path<i64>) -> Result<StatusCode, Error> {
    controller.delete_canvas(id).await?;
    Ok(StatusCode::OK)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateFeatureRequest {
    host_name: String,
    friendly_name: String,
    port: u16,
    width: u32,
    height: u32,
    #[serde(default)]
    offset_x: u32,
    #[serde(default)]
    offset_y: u32,
    #[serde(default)]
    channel: u8,
    #[serde(default)]
    reversed: bool,
    #[serde(default)]
    red_green_swap: bool,
}

impl CreateFeatureRequest {
    fn into_feature(self, id: i64) -> Feature {
        Feature::new(
            id,
            self.host_name,
            self.friendly_name,
            self.port,
            self.offset_x,
            self.offset_y,
            self.width,
            self.height,
            self.channel,
            self.reversed,
            self.red_green_swap,
        )
    }
}

async fn list_features(
    State(controller): State<Arc<Controller>>,
    Path(canvas_id): Path<i64>,
) -> Result<Json<serde_json::Value>, Error> {
    let features = controller.list_features(canvas_id).await?;
    Ok(Json(serde_json::json!({ "features": features })))
}

async fn create_feature(
    State(controller): State<Arc<Controller>>,
    Path(canvas_id): Path<i64>,
    Json(request): Json<CreateFeatureRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), Error> {
    let feature_id = controller.create_feature(canvas_id, request.into_feature(0)).await?;
    let summary = controller.get_feature(canvas_id, feature_id).await?;
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "feature": summary }))))
}

async fn get_feature(
    State(controller): State<Arc<Controller>>,
    Path((canvas_id, feature_id)): Path<(i64, i64)>,
) -> Result<Json<serde_json::Value>, Error> {
    let summary = controller.get_feature(canvas_id, feature_id).await?;
    Ok(Json(serde_json::json!({ "feature": summary })))
}

async fn update_feature(
    State(controller): State<Arc<Controller>>,
    Path((canvas_id, feature_id)): Path<(i64, i64)>,
    Json(request): Json<CreateFeatureRequest>,
) -> Result<Json<serde_json::Value>, Error> {
    controller
        .update_feature(canvas_id, feature_id, request.into_feature(feature_id))
        .await?;
    let summary = controller.get_feature(canvas_id, feature_id).await?;
    Ok(Json(serde_json::json!({ "feature": summary })))
}

async fn delete_feature(
    State(controller): State<Arc<Controller>>,
    Path((canvas_id, feature_id)): Path<(i64, i64)>,
) -> Result<StatusCode, Error> {
    controller.remove_feature(canvas_id, feature_id).await?;
    Ok(StatusCode::OK)
}

async fn list_sockets(State(controller): State<Arc<Controller>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "sockets": controller.sockets_summary().await }))
}

async fn get_socket(
    State(controller): State<Arc<Controller>>,
    Path(host): Path<String>,
) -> Result<Json<serde_json::Value>, Error> {
    let summary = controller.socket_by_host(&host).await?;
    Ok(Json(serde_json::json!({ "socket": summary })))
}
