use rmcp::ServiceExt;
use std::sync::Arc;
use tokio::io::{stdin, stdout};

use fmr_assistant::config;
use fmr_assistant::initialization::initialize_pipeline;
use fmr_assistant::server::FundReportHandler;

use anyhow::Result;
use env_logger;
use log;

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the MCP transport, so logs go to stderr
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();
    log::info!("fmr-assistant server (MCP over stdio) starting.");

    let config = config::load_config()?;
    log::info!("Configuration loaded: {:?}", config);

    let pipeline = initialize_pipeline(&config).await.inspect_err(|e| {
        log::error!("Startup failed: {:#}", e);
    })?;
    let handler = FundReportHandler::new(Arc::new(pipeline));

    log::info!("Starting MCP server listener...");
    let server_handle = handler.serve((stdin(), stdout())).await.inspect_err(|e| {
        log::error!("serving error: {:?}", e);
    })?;

    log::info!("fmr-assistant server running, waiting for completion...");
    let shutdown_reason = server_handle.waiting().await?;
    log::info!("fmr-assistant server finished. Reason: {:?}", shutdown_reason);

    Ok(())
}
