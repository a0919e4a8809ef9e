//! Thread-safe registry of Socket Channels keyed by host.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::feature::Feature;
use crate::socket_channel::SocketChannel;

/// Registry of Socket Channels keyed by host name. The map's own lock is
/// never held while blocking on a channel's internal state, per the
/// deadlock-avoidance rule in the concurrency model.
pub struct SocketController {
    channels: RwLock<HashMap<String, Arc<SocketChannel>>>,
}

impl SocketController {
    pub fn new() -> Self {
        SocketController {
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Starts a channel for `(host, friendly_name, port)` if one does not
    /// already exist for that host, returning the (possibly pre-existing)
    /// channel.
    pub async fn add_channel(&self, host: &str, friendly_name: &str, port: u16) -> Arc<SocketChannel> {
        if let Some(existing) = self.channels.read().await.get(host) {
            return existing.clone();
        }
        let mut channels = self.channels.write().await;
        if let Some(existing) = channels.get(host) {
            return existing.clone();
        }
        let channel = SocketChannel::spawn(host.to_string(), friendly_name.to_string(), port);
        channels.insert(host.to_string(), channel.clone());
        channel
    }

    /// Constructs (or reuses) a channel for every feature in `features`.
    /// This is the channel-construction half of spec.md §4.6's
    /// `AddChannelsForCanvases` contract; `Controller::connect` is the
    /// single entry point that calls this and then arms each canvas's
    /// effects scheduler, so the named operation still lands as one atomic
    /// step from a caller's perspective even though channel construction
    /// (owned by this registry) and scheduler arming (owned by the
    /// `Controller`, which holds the canvas/scheduler state this registry
    /// does not) are necessarily two method bodies.
    pub async fn add_channels_for_features(&self, features: &[Feature]) {
        for feature in features {
            self.add_channel(&feature.host_name, &feature.friendly_name, feature.port)
                .await;
        }
    }

    pub async fn find_channel_by_host(&self, host: &str) -> Option<Arc<SocketChannel>> {
        self.channels.read().await.get(host).cloned()
    }

    pub async fn all_channels(&self) -> Vec<Arc<SocketChannel>> {
        self.channels.read().await.values().cloned().collect()
    }

    /// Channels start eagerly when `add_channel` spawns them, so this is a
    /// no-op kept for parity with the registry's lifecycle fan-out API.
    pub async fn start_all(&self) {}

    pub async fn stop_all(&self) {
        let channels: Vec<Arc<SocketChannel>> = self.channels.read().await.values().cloned().collect();
        for channel in channels {
            channel.stop().await;
        }
    }

    /// Stops every channel, then clears the registry.
    pub async fn remove_all_channels(&self) {
        self.stop_all().await;
        self.channels.write().await.clear();
    }
}

impl Default for SocketController {
    fn default() -> Self {
        Self::new()
    }
}
