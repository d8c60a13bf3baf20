use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use civicflo_ai::{
    load_class_mapping, router, AppState, Args, CivicTaxonomy, OnnxModel, PreprocessConfig,
    Processor, YoloDetector,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let labels = load_class_mapping(&args.labels)?;
    let taxonomy = CivicTaxonomy::load(&args.taxonomy)?;

    // A model that fails to load aborts startup; there is no degraded mode.
    let session = OnnxModel::new(args.cuda).load_model(&args.model)?;
    info!("detection model loaded from {}", args.model);

    let detector = YoloDetector::new(
        session,
        Processor::new(PreprocessConfig::default()),
        labels,
        args.confidence,
        args.iou,
    );
    let state = AppState::new(Arc::new(detector), taxonomy);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    info!("listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}
