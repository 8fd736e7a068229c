// Ecobee Exporter - Thermostat and sensor metrics exporter for Prometheus
//
// Copyright 2022 Nick Pillitteri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

use clap::{crate_version, Parser};
use ecobee_exporter::client::{ClientConfig, EcobeeClient, DEFAULT_API_URL};
use ecobee_exporter::http::{http_route, RequestContext};
use ecobee_exporter::metrics::{MetricsExposition, ThermostatCollector};
use hyper::service::{make_service_fn, service_fn};
use hyper::Server;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use std::{io, process};
use tokio::signal::unix::{self, SignalKind};
use tracing::{event, span, Instrument, Level};

const DEFAULT_LOG_LEVEL: Level = Level::INFO;
const DEFAULT_BIND_ADDR: ([u8; 4], u16) = ([0, 0, 0, 0], 9783);
const DEFAULT_METRIC_PREFIX: &str = "ecobee";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Expose Ecobee thermostat and sensor readings as Prometheus metrics
///
/// Fetch the current state of all thermostats registered to an Ecobee account,
/// along with their remote sensors, each time metrics are scraped and expose them
/// as Prometheus metrics. Temperature, humidity, occupancy, and thermostat setpoints
/// are emitted.
///
/// OAuth tokens for the Ecobee API are read from a cache file that must already
/// contain tokens for the account. Tokens are refreshed and written back to the
/// cache file when they expire.
#[derive(Debug, Parser)]
#[clap(name = "ecobee_exporter", version = crate_version!())]
struct EcobeeExporterApplication {
    /// Application key from the Ecobee developer portal
    #[clap(long)]
    app_id: String,

    /// Path to the JSON file caching OAuth access and refresh tokens
    #[clap(long)]
    cache_file: PathBuf,

    /// Prefix for the name of all emitted metrics
    #[clap(long, default_value = DEFAULT_METRIC_PREFIX)]
    metric_prefix: String,

    /// Base URL of the Ecobee API
    #[clap(long, default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Timeout for each request made to the Ecobee API, in seconds
    #[clap(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,

    /// Logging verbosity. Allowed values are 'trace', 'debug', 'info', 'warn', and 'error'
    /// (case insensitive)
    #[clap(long, default_value_t = DEFAULT_LOG_LEVEL)]
    log_level: Level,

    /// Address to bind to. By default, ecobee_exporter will bind to public address since
    /// the purpose is to expose metrics to an external system (Prometheus or another
    /// agent for ingestion)
    #[clap(long, default_value_t = DEFAULT_BIND_ADDR.into())]
    bind: SocketAddr,
}

impl From<&EcobeeExporterApplication> for ClientConfig {
    fn from(opts: &EcobeeExporterApplication) -> Self {
        ClientConfig {
            app_id: opts.app_id.clone(),
            cache_file: opts.cache_file.clone(),
            api_url: opts.api_url.trim_end_matches('/').to_owned(),
            timeout: Duration::from_secs(opts.timeout_secs),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let opts = EcobeeExporterApplication::parse();
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(opts.log_level)
            .finish(),
    )
    .expect("failed to set tracing subscriber");

    let startup = Instant::now();
    let client = EcobeeClient::new(ClientConfig::from(&opts));

    // The default registry includes process metrics on Linux.
    let reg = prometheus::default_registry().clone();
    reg.register(Box::new(ThermostatCollector::new(client, &opts.metric_prefix)))
        .unwrap_or_else(|e| {
            event!(
                Level::ERROR,
                message = "failed to register thermostat metric collector",
                error = %e,
            );

            process::exit(1)
        });

    let metrics = MetricsExposition::new(reg);
    let context = Arc::new(RequestContext::new(metrics));
    let service = make_service_fn(move |_| {
        let context = context.clone();

        async move {
            Ok::<_, hyper::Error>(service_fn(move |req| {
                http_route(req, context.clone()).instrument(span!(Level::DEBUG, "ecobee_request"))
            }))
        }
    });
    let server = Server::try_bind(&opts.bind).unwrap_or_else(|e| {
        event!(
            Level::ERROR,
            message = "server failed to start",
            address = %opts.bind,
            error = %e,
        );

        process::exit(1);
    });

    event!(
        Level::INFO,
        message = "server started",
        address = %opts.bind,
        cache_file = %opts.cache_file.display(),
    );

    server
        .serve(service)
        .with_graceful_shutdown(async {
            // Wait for either SIGTERM or SIGINT to shutdown
            tokio::select! {
                _ = sigterm() => {}
                _ = sigint() => {}
            }
        })
        .await?;

    event!(
        Level::INFO,
        message = "server shutdown",
        runtime_secs = %startup.elapsed().as_secs(),
    );

    Ok(())
}

/// Return after the first SIGTERM signal received by this process
async fn sigterm() -> io::Result<()> {
    unix::signal(SignalKind::terminate())?.recv().await;
    Ok(())
}

/// Return after the first SIGINT signal received by this process
async fn sigint() -> io::Result<()> {
    tokio::signal::ctrl_c().await
}
