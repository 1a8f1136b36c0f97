mod app;
mod capture;
mod commands;
mod config;
mod lifecycle;
mod logging;
mod page;
mod recording;
mod ui;
mod visualization;

#[tokio::main]
async fn main() {
    if let Err(e) = app::run().await {
        tracing::error!("Fatal error: {e:#}");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
