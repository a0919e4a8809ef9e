//! Root aggregate: owns canvases, starts/stops the effects schedulers and
//! the socket controller.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{Mutex as AsyncMutex, RwLock};
use tokio::task::JoinHandle;

use crate::canvas::Canvas;
use crate::compression::compress_frame;
use crate::config::ConfigDocument;
use crate::effect::EffectRegistry;
use crate::error::{Error, Result};
use crate::feature::Feature;
use crate::socket_channel::SocketChannel;
use crate::socket_controller::SocketController;

/// Default REST bind port, matching the original source's `WebServer`.
pub const DEFAULT_PORT: u16 = 7777;

struct SchedulerHandle {
    running: Arc<AtomicBool>,
    join_handle: JoinHandle<()>,
}

impl SchedulerHandle {
    async fn stop(self) {
        self.running.store(false, Ordering::Release);
        let _ = self.join_handle.await;
    }
}

pub struct Controller {
    canvases: RwLock<HashMap<i64, Arc<AsyncMutex<Canvas>>>>,
    canvas_order: RwLock<Vec<i64>>,
    next_canvas_id: AtomicI64,
    socket_controller: Arc<SocketController>,
    schedulers: AsyncMutex<HashMap<i64, SchedulerHandle>>,
    effect_registry: EffectRegistry,
}

impl Controller {
    pub fn new() -> Self {
        Controller {
            canvases: RwLock::new(HashMap::new()),
            canvas_order: RwLock::new(Vec::new()),
            next_canvas_id: AtomicI64::new(1),
            socket_controller: Arc::new(SocketController::new()),
            schedulers: AsyncMutex::new(HashMap::new()),
            effect_registry: EffectRegistry::with_builtin_effects(),
        }
    }

    pub fn socket_controller(&self) -> Arc<SocketController> {
        self.socket_controller.clone()
    }

    /// Adds `canvas`, rejecting a duplicate id.
    pub async fn add_canvas(&self, canvas: Canvas) -> Result<i64> {
        let id = canvas.id;
        let mut canvases = self.canvases.write().await;
        if canvases.contains_key(&id) {
            return Err(Error::InvalidArgument(format!("canvas id {id} already exists")));
        }
        canvases.insert(id, Arc::new(AsyncMutex::new(canvas)));
        self.canvas_order.write().await.push(id);
        self.bump_next_id(id);
        Ok(id)
    }

    /// Allocates a fresh id and adds a new canvas, as used by `POST
    /// /api/canvases` with `id: -1`.
    pub async fn create_canvas(&self, name: &str, width: u32, height: u32, fps: u32) -> Result<i64> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidArgument("canvas width and height must be > 0".into()));
        }
        let id = self.next_canvas_id.fetch_add(1, Ordering::Relaxed);
        let canvas = Canvas::new(id, name, width, height, fps);
        self.canvases.write().await.insert(id, Arc::new(AsyncMutex::new(canvas)));
        self.canvas_order.write().await.push(id);
        Ok(id)
    }

    pub async fn get_canvas(&self, id: i64) -> Result<Arc<AsyncMutex<Canvas>>> {
        self.canvases
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("canvas id {id}")))
    }

    pub async fn delete_canvas(&self, id: i64) -> Result<()> {
        let removed = self.canvases.write().await.remove(&id);
        if removed.is_none() {
            return Err(Error::NotFound(format!("canvas id {id}")));
        }
        self.canvas_order.write().await.retain(|&existing| existing != id);
        if let Some(handle) = self.schedulers.lock().await.remove(&id) {
            handle.stop().await;
        }
        Ok(())
    }

    pub async fn list_canvas_ids(&self) -> Vec<i64> {
        self.canvas_order.read().await.clone()
    }

    /// Replaces the canvas at `id` with a fresh canvas of the given
    /// dimensions, dropping its features and effects along with it, and
    /// stopping its scheduler if one was running.
    pub async fn update_canvas(&self, id: i64, name: &str, width: u32, height: u32, fps: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidArgument("canvas width and height must be > 0".into()));
        }
        let mut canvases = self.canvases.write().await;
        if !canvases.contains_key(&id) {
            return Err(Error::NotFound(format!("canvas id {id}")));
        }
        if let Some(handle) = self.schedulers.lock().await.remove(&id) {
            handle.stop().await;
        }
        canvases.insert(id, Arc::new(AsyncMutex::new(Canvas::new(id, name, width, height, fps))));
        Ok(())
    }

    pub async fn canvas_summary(&self, id: i64) -> Result<CanvasSummary> {
        let canvas = self.get_canvas(id).await?;
        let canvas = canvas.lock().await;
        Ok(CanvasSummary {
            id: canvas.id,
            name: canvas.name.clone(),
            width: canvas.width(),
            height: canvas.height(),
            fps: canvas.fps(),
            feature_count: canvas.features().len(),
        })
    }

    pub async fn canvases_summary(&self) -> Vec<CanvasSummary> {
        let mut out = Vec::new();
        for id in self.list_canvas_ids().await {
            if let Ok(summary) = self.canvas_summary(id).await {
                out.push(summary);
            }
        }
        out
    }

    pub async fn add_feature(&self, canvas_id: i64, feature: Feature) -> Result<()> {
        let canvas = self.get_canvas(canvas_id).await?;
        canvas.lock().await.add_feature(feature)
    }

    /// Adds `feature` to `canvas_id`, assigning it a fresh id scoped to that
    /// canvas, and returns the assigned id. Used by the REST layer's `POST`,
    /// which has no id of its own to offer.
    pub async fn create_feature(&self, canvas_id: i64, feature: Feature) -> Result<i64> {
        let canvas = self.get_canvas(canvas_id).await?;
        canvas.lock().await.add_feature_auto(feature)
    }

    pub async fn list_features(&self, canvas_id: i64) -> Result<Vec<FeatureSummary>> {
        let canvas = self.get_canvas(canvas_id).await?;
        let canvas = canvas.lock().await;
        Ok(canvas.features().iter().map(FeatureSummary::from).collect())
    }

    pub async fn get_feature(&self, canvas_id: i64, feature_id: i64) -> Result<FeatureSummary> {
        let canvas = self.get_canvas(canvas_id).await?;
        let canvas = canvas.lock().await;
        canvas.get_feature(feature_id).map(FeatureSummary::from)
    }

    pub async fn update_feature(&self, canvas_id: i64, feature_id: i64, feature: Feature) -> Result<()> {
        let canvas = self.get_canvas(canvas_id).await?;
        canvas.lock().await.update_feature(feature_id, feature)
    }

    pub async fn remove_feature(&self, canvas_id: i64, feature_id: i64) -> Result<()> {
        let canvas = self.get_canvas(canvas_id).await?;
        canvas.lock().await.remove_feature(feature_id)
    }

    /// Fans out to every feature's socket, starting a channel for each, then
    /// arms every canvas's effects scheduler — the one atomic operation
    /// spec.md §4.6 names `AddChannelsForCanvases` (channel construction plus
    /// scheduler arming), split here only because channel construction is
    /// owned by the `SocketController` registry and scheduler arming is
    /// owned by this `Controller`.
    pub async fn connect(&self) -> Result<()> {
        let ids = self.list_canvas_ids().await;
        let mut all_features = Vec::new();
        for id in ids {
            let canvas = self.get_canvas(id).await?;
            let canvas = canvas.lock().await;
            all_features.extend(canvas.features().iter().cloned());
        }
        self.socket_controller.add_channels_for_features(&all_features).await;
        self.start().await;
        Ok(())
    }

    pub async fn disconnect(&self) {
        self.socket_controller.remove_all_channels().await;
    }

    /// Spawns the effects scheduler for every canvas that does not already
    /// have one running.
    pub async fn start(&self) {
        let ids = self.list_canvas_ids().await;
        let mut schedulers = self.schedulers.lock().await;
        for id in ids {
            if schedulers.contains_key(&id) {
                continue;
            }
            if let Ok(canvas) = self.get_canvas(id).await {
                let running = Arc::new(AtomicBool::new(true));
                let scheduler_running = running.clone();
                let socket_controller = self.socket_controller.clone();
                let join_handle = tokio::spawn(async move {
                    scheduler_loop(canvas, socket_controller, scheduler_running).await;
                });
                schedulers.insert(id, SchedulerHandle { running, join_handle });
            }
        }
    }

    /// Stops every running effects scheduler.
    pub async fn stop(&self) {
        let handles: Vec<SchedulerHandle> = {
            let mut schedulers = self.schedulers.lock().await;
            schedulers.drain().map(|(_, handle)| handle).collect()
        };
        for handle in handles {
            handle.stop().await;
        }
    }

    pub async fn sockets_summary(&self) -> Vec<SocketSummary> {
        let mut out = Vec::new();
        for channel in self.socket_controller.all_channels().await {
            out.push(summarize_channel(&channel).await);
        }
        out
    }

    pub async fn socket_by_host(&self, host: &str) -> Result<SocketSummary> {
        let channel = self
            .socket_controller
            .find_channel_by_host(host)
            .await
            .ok_or_else(|| Error::NotFound(format!("socket for host {host}")))?;
        Ok(summarize_channel(&channel).await)
    }

    /// Builds canvases, features, and effects from a configuration
    /// document. Per-entity failures are collected and returned alongside
    /// the controller; the rest of the configuration still loads.
    pub async fn from_config(doc: ConfigDocument) -> (Controller, Vec<Error>) {
        let controller = Controller::new();
        let mut errors = Vec::new();

        for canvas_cfg in doc.canvases {
            if canvas_cfg.width == 0 || canvas_cfg.height == 0 {
                errors.push(Error::Configuration(format!(
                    "canvas '{}' has invalid dimensions",
                    canvas_cfg.name
                )));
                continue;
            }
            let mut canvas = Canvas::new(
                canvas_cfg.id,
                canvas_cfg.name.clone(),
                canvas_cfg.width,
                canvas_cfg.height,
                canvas_cfg.fps,
            );

            for (idx, feature_cfg) in canvas_cfg.features.into_iter().enumerate() {
                let mut feature = Feature::new(
                    idx as i64,
                    feature_cfg.host_name,
                    feature_cfg.friendly_name,
                    feature_cfg.port,
                    feature_cfg.offset_x,
                    feature_cfg.offset_y,
                    feature_cfg.width,
                    feature_cfg.height,
                    feature_cfg.channel,
                    feature_cfg.reversed,
                    feature_cfg.red_green_swap,
                );
                feature.client_buffer_count = feature_cfg.client_buffer_count;
                if let Err(e) = canvas.add_feature(feature) {
                    errors.push(e);
                }
            }

            for effect_cfg in canvas_cfg.effects {
                match controller
                    .effect_registry
                    .construct(&effect_cfg.r#type, &effect_cfg.name, &effect_cfg.params)
                {
                    Ok(effect) => {
                        let index = canvas.add_effect(effect);
                        if canvas.effects().current_index() == Some(index) {
                            canvas.start_current_effect();
                        }
                    }
                    Err(e) => errors.push(e),
                }
            }

            if let Err(e) = controller.add_canvas(canvas).await {
                errors.push(e);
            }
        }

        (controller, errors)
    }

    pub async fn load_from_file(path: &str) -> Result<(Controller, Vec<Error>)> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::Configuration(format!("reading '{path}': {e}")))?;
        let doc: ConfigDocument =
            serde_json::from_str(&text).map_err(|e| Error::Configuration(format!("parsing '{path}': {e}")))?;
        Ok(Controller::from_config(doc).await)
    }

    fn bump_next_id(&self, id: i64) {
        if id >= 0 {
            self.next_canvas_id.fetch_max(id + 1, Ordering::Relaxed);
        }
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CanvasSummary {
    pub id: i64,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub feature_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeatureSummary {
    pub id: i64,
    pub host_name: String,
    pub friendly_name: String,
    pub port: u16,
    pub offset_x: u32,
    pub offset_y: u32,
    pub width: u32,
    pub height: u32,
    pub channel: u8,
    pub reversed: bool,
    pub red_green_swap: bool,
}

impl From<&Feature> for FeatureSummary {
    fn from(feature: &Feature) -> Self {
        FeatureSummary {
            id: feature.id,
            host_name: feature.host_name.clone(),
            friendly_name: feature.friendly_name.clone(),
            port: feature.port,
            offset_x: feature.offset_x,
            offset_y: feature.offset_y,
            width: feature.width,
            height: feature.height,
            channel: feature.channel,
            reversed: feature.reversed,
            red_green_swap: feature.red_green_swap,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SocketSummary {
    pub host_name: String,
    pub friendly_name: String,
    pub port: u16,
    pub connected: bool,
    pub reconnect_count: u64,
    pub bytes_per_second: f64,
}

async fn summarize_channel(channel: &Arc<SocketChannel>) -> SocketSummary {
    SocketSummary {
        host_name: channel.host_name().to_string(),
        friendly_name: channel.friendly_name().to_string(),
        port: channel.port(),
        connected: channel.is_connected(),
        reconnect_count: channel.reconnect_count(),
        bytes_per_second: channel.bytes_per_second().await,
    }
}

/// One dedicated task per canvas. At the canvas's target period, updates
/// the active effect, enqueues a data frame per feature, then sleeps to an
/// absolute deadline in slices of at most 10 ms with bounded catch-up.
async fn scheduler_loop(canvas: Arc<AsyncMutex<Canvas>>, socket_controller: Arc<SocketController>, running: Arc<AtomicBool>) {
    let fps = canvas.lock().await.fps().max(1);
    let period = Duration::from_millis((1000 / fps as u64).max(1));
    let mut next_tick = Instant::now();

    while running.load(Ordering::Acquire) {
        next_tick += period;

        {
            let mut locked = canvas.lock().await;
            locked.update_current_effect(period);
            let fps = locked.fps();
            let pixel_buffer = locked.graphics();
            let mut frames = Vec::with_capacity(locked.features().len());
            for feature in locked.features() {
                let frame = feature.get_data_frame(pixel_buffer, fps);
                frames.push((feature.host_name.clone(), compress_frame(&frame)));
            }
            drop(locked);
            for (host, compressed) in frames {
                if let Some(channel) = socket_controller.find_channel_by_host(&host).await {
                    channel.enqueue(compressed).await;
                }
            }
        }

        loop {
            if !running.load(Ordering::Acquire) {
                break;
            }
            let now = Instant::now();
            if now >= next_tick {
                break;
            }
            let remaining = next_tick - now;
            let sleep_for = remaining.min(Duration::from_millis(10));
            tokio::time::sleep(sleep_for).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_canvas_assigns_positive_id() {
        let controller = Controller::new();
        let id = controller.create_canvas("c", 4, 4, 30).await.unwrap();
        assert!(id > 0);
        assert!(controller.get_canvas(id).await.is_ok());
    }

    #[tokio::test]
    async fn get_unknown_canvas_is_not_found() {
        let controller = Controller::new();
        assert!(matches!(controller.get_canvas(999).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn add_canvas_rejects_duplicate_id() {
        let controller = Controller::new();
        controller.add_canvas(Canvas::new(1, "a", 4, 4, 30)).await.unwrap();
        let result = controller.add_canvas(Canvas::new(1, "b", 4, 4, 30)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn config_with_bad_effect_type_still_builds_other_entities() {
        let json = r#"{
            "canvases": [
                {
                    "id": 1, "name": "a", "width": 4, "height": 4, "fps": 30,
                    "features": [],
                    "effects": [ { "type": "NoSuchEffect", "name": "x" } ]
                },
                {
                    "id": 2, "name": "b", "width": 4, "height": 4, "fps": 30,
                    "features": [], "effects": []
                }
            ]
        }"#;
        let doc: ConfigDocument = serde_json::from_str(json).unwrap();
        let (controller, errors) = Controller::from_config(doc).await;
        assert_eq!(errors.len(), 1);
        assert!(controller.get_canvas(1).await.is_ok());
        assert!(controller.get_canvas(2).await.is_ok());
    }

    fn sample_feature(friendly_name: &str) -> Feature {
        Feature::new(0, "192.168.1.1", friendly_name, 49152, 0, 0, 4, 4, 0, false, false)
    }

    #[tokio::test]
    async fn create_feature_assigns_id_scoped_to_canvas() {
        let controller = Controller::new();
        let canvas_id = controller.create_canvas("c", 4, 4, 30).await.unwrap();
        let feature_id = controller.create_feature(canvas_id, sample_feature("f")).await.unwrap();
        let summary = controller.get_feature(canvas_id, feature_id).await.unwrap();
        assert_eq!(summary.friendly_name, "f");
    }

    #[tokio::test]
    async fn list_features_returns_every_attached_feature() {
        let controller = Controller::new();
        let canvas_id = controller.create_canvas("c", 4, 4, 30).await.unwrap();
        controller.create_feature(canvas_id, sample_feature("a")).await.unwrap();
        controller.create_feature(canvas_id, sample_feature("b")).await.unwrap();
        let features = controller.list_features(canvas_id).await.unwrap();
        assert_eq!(features.len(), 2);
    }

    #[tokio::test]
    async fn update_feature_changes_fields_in_place() {
        let controller = Controller::new();
        let canvas_id = controller.create_canvas("c", 4, 4, 30).await.unwrap();
        let feature_id = controller.create_feature(canvas_id, sample_feature("f")).await.unwrap();
        controller
            .update_feature(canvas_id, feature_id, sample_feature("renamed"))
            .await
            .unwrap();
        let summary = controller.get_feature(canvas_id, feature_id).await.unwrap();
        assert_eq!(summary.friendly_name, "renamed");
        assert_eq!(summary.id, feature_id);
    }

    #[tokio::test]
    async fn remove_feature_then_get_is_not_found() {
        let controller = Controller::new();
        let canvas_id = controller.create_canvas("c", 4, 4, 30).await.unwrap();
        let feature_id = controller.create_feature(canvas_id, sample_feature("f")).await.unwrap();
        controller.remove_feature(canvas_id, feature_id).await.unwrap();
        assert!(matches!(
            controller.get_feature(canvas_id, feature_id).await,
            Err(Error::NotFound(_))
        ));
    }
}
