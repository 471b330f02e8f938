use std::net::SocketAddr;

use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;
use tracing::{debug, error, info};
use warp::Filter;

use common::logger;

use crate::app::App;
use crate::config::{RelayConfig, Role};

mod api;
mod app;
mod config;
mod remote;
mod services;
mod stages;

#[derive(Parser, Debug)]
#[command(author, version, about = "Candle to pattern to signal relay", long_about = None)]
struct Args {
    /// Which stages this process serves
    #[arg(long, value_enum, default_value_t = Role::All)]
    role: Role,

    /// Listen address, overrides BIND_ADDRESS
    #[arg(long)]
    bind: Option<String>,

    /// Listen port, overrides PORT and the role default
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    logger::setup_logger();
    let args = Args::parse();
    debug!("Arguments: {:?}", args);

    let config = RelayConfig::from_env().context("invalid configuration")?;
    let bind = args.bind.unwrap_or_else(|| config.bind_address.clone());
    let port = args.port.or(config.port).unwrap_or_else(|| args.role.default_port());
    let addr: SocketAddr = format!("{}:{}", bind, port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", bind, port))?;

    info!("Starting {} ({})", args.role, env!("CARGO_PKG_VERSION"));
    let app = App::build(args.role, &config).await?;
    let routes = api::routes(&app.state).with(warp::trace::request());

    let (bound, server) = warp::serve(routes)
        .try_bind_with_graceful_shutdown(addr, async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Shutdown requested"),
                Err(e) => {
                    error!("Cannot listen for Ctrl-C, running until killed: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        })
        .with_context(|| format!("cannot listen on {}", addr))?;

    info!("{} listening on {}", args.role, bound);
    server.await;

    app.shutdown().await;
    info!("{} stopped", args.role);
    Ok(())
}
