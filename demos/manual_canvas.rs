//! Builds a canvas and feature in-process, without a configuration file.
//!
//! Mirrors the original source's `LoadCanvases`: one 512x32 canvas driven
//! by a ColorWave effect, with a single feature streaming to one client.
//!
//! Usage:
//!   cargo run --example manual_canvas

use std::error::Error;

use ndscpp_server::canvas::Canvas;
use ndscpp_server::controller::Controller;
use ndscpp_server::effects::ColorWave;
use ndscpp_server::feature::Feature;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let controller = Controller::new();

    let mut canvas = Canvas::new(1, "Workbench Matrix", 512, 32, 30);
    let feature = Feature::new(
        1,
        "192.168.8.176",
        "Workbench Matrix",
        ndscpp_server::DEFAULT_CLIENT_PORT,
        0,
        0,
        512,
        32,
        0,
        false,
        false,
    );
    canvas.add_feature(feature)?;
    canvas.add_effect(Box::new(ColorWave::new("Color Wave", 0.5, 10.0)));
    canvas.set_current_effect(0)?;

    controller.add_canvas(canvas).await?;
    controller.connect().await?;
    controller.start().await;

    println!("Running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    controller.stop().await;
    controller.disconnect().await;
    Ok(())
}
