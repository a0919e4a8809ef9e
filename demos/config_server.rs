//! Loads a configuration document and runs the REST API plus the effects
//! schedulers until Ctrl+C.
//!
//! Usage:
//!   cargo run --example config_server -- --config ./matrix.json --port 7777

use std::error::Error;
use std::sync::Arc;

use clap::Parser;
use ndscpp_server::api;
use ndscpp_server::controller::Controller;

/// ndscpp-server: canvas/feature LED matrix driver.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to the JSON configuration document.
    #[arg(long)]
    config: String,

    /// Port the REST API binds to.
    #[arg(long, default_value_t = ndscpp_server::DEFAULT_REST_PORT)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();

    let (controller, errors) = Controller::load_from_file(&args.config).await?;
    for error in &errors {
        log::warn!("configuration entity skipped: {error}");
    }
    let controller = Arc::new(controller);

    controller.connect().await?;
    controller.start().await;

    let router = api::router(controller.clone());
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", args.port)).await?;
    println!("REST API listening on :{}", args.port);

    tokio::select! {
        result = axum::serve(listener, router) => { result?; }
        _ = tokio::signal::ctrl_c() => {
            println!("received Ctrl+C, shutting down");
        }
    }

    controller.stop().await;
    controller.disconnect().await;
    Ok(())
}
