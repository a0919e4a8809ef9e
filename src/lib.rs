// Copyright 2025 Dustin McAfee
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # ndscpp-server
//!
//! A central server that drives fleets of networked LED display clients.
//! The host renders animated frames into logical 2-D pixel canvases, slices
//! each canvas into rectangular regions bound to individual clients, and
//! streams timestamped, compressed pixel packets to each client over
//! persistent TCP connections at a target frame rate. Clients send back
//! status frames (buffer fill, clock, FPS, signal, watts) which the server
//! surfaces via a REST API.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              Controller                 │
//! │  owns canvases, fans out start/stop      │
//! └──────────────────┬──────────────────────┘
//!                    │
//!        ┌───────────┼────────────────┐
//!        ▼                            ▼
//! ┌─────────────┐             ┌────────────────┐
//! │   Canvas    │             │ SocketController│
//! │  PixelBuffer│             │  host -> channel│
//! │  Features   │             └────────┬───────┘
//! │  Effects    │                      │
//! └──────┬──────┘                      ▼
//!        │ one scheduler task   ┌──────────────┐
//!        └─────────────────────▶│ SocketChannel│ one worker task per Feature
//!                               │ queue, batch,│
//!                               │ connect, send│
//!                               └──────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use ndscpp_server::controller::Controller;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let controller = Controller::new();
//!     let canvas_id = controller.create_canvas("Workbench Matrix", 512, 32, 30).await?;
//!     controller.connect().await?;
//!     controller.start().await;
//!     let _ = canvas_id;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod canvas;
pub mod color;
pub mod compression;
pub mod config;
pub mod controller;
pub mod effect;
pub mod effects;
pub mod effects_manager;
pub mod error;
pub mod feature;
pub mod pixelbuffer;
pub mod socket_channel;
pub mod socket_controller;
pub mod wire;

pub use controller::Controller;
pub use error::{Error, Result};

/// Default port the effects scheduler's clients listen on.
pub const DEFAULT_CLIENT_PORT: u16 = 49152;

/// Default port the REST API binds to.
pub const DEFAULT_REST_PORT: u16 = controller::DEFAULT_PORT;
