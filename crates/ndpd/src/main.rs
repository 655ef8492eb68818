// # ndpd - NDP neighbor cache daemon
//
// Thin integration layer around ndp-core. No protocol logic lives here.
//
// The ndpd daemon is responsible for:
// 1. Reading configuration from environment variables (and an optional JSON file)
// 2. Initializing logging and the runtime
// 3. Building the neighbor cache and its collaborators
// 4. Running the retry engine until SIGTERM/SIGINT
//
// ## Configuration
//
// - `NDP_CONFIG_PATH`: JSON file with an `NdpConfig` (optional)
// - `NDP_INTERFACES`: Number of interfaces (overrides the file)
// - `NDP_CACHE_SIZE`: Entries per interface table (overrides the file)
// - `NDP_DEFENSIVE`: `true`/`false`, defensive processing of unsolicited messages
// - `NDP_STATIC_NEIGHBORS`: Comma-separated `ip=mac` pairs pinned on interface 0
// - `NDP_LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Example
//
// ```bash
// export NDP_INTERFACES=2
// export NDP_CACHE_SIZE=32
// export NDP_STATIC_NEIGHBORS=fe80::1=02:00:5e:00:00:01
//
// ndpd
// ```

use anyhow::{Context, Result};
use async_trait::async_trait;
use ndp_core::traits::{AdvertisementReply, NdpLink, SolicitationRequest};
use ndp_core::{ChannelNotifier, InterfaceId, LinkAddr, NdpConfig, NdpEngine, NeighborCache, NeighborState};
use std::env;
use std::net::Ipv6Addr;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{Level, debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum NdpExitCode {
    CleanShutdown = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<NdpExitCode> for ExitCode {
    fn from(code: NdpExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    config_path: Option<String>,
    interfaces: Option<usize>,
    cache_size: Option<usize>,
    defensive: Option<bool>,
    static_neighbors: Vec<(Ipv6Addr, LinkAddr)>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            config_path: env::var("NDP_CONFIG_PATH").ok(),
            interfaces: parse_var("NDP_INTERFACES")?,
            cache_size: parse_var("NDP_CACHE_SIZE")?,
            defensive: parse_var("NDP_DEFENSIVE")?,
            static_neighbors: parse_static_neighbors(&env::var("NDP_STATIC_NEIGHBORS").unwrap_or_default())?,
            log_level: env::var("NDP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if let Some(path) = &self.config_path {
            if !std::path::Path::new(path).is_file() {
                anyhow::bail!("NDP_CONFIG_PATH does not point to a file: {}", path);
            }
        }

        if let Some(interfaces) = self.interfaces {
            if !(1..=64).contains(&interfaces) {
                anyhow::bail!("NDP_INTERFACES must be between 1 and 64. Got: {}", interfaces);
            }
        }

        if let Some(size) = self.cache_size {
            if !(1..=4096).contains(&size) {
                anyhow::bail!("NDP_CACHE_SIZE must be between 1 and 4096. Got: {}", size);
            }
        }

        if self.static_neighbors.len() > self.cache_size.unwrap_or(usize::MAX) {
            anyhow::bail!(
                "NDP_STATIC_NEIGHBORS lists {} neighbors but NDP_CACHE_SIZE is {}",
                self.static_neighbors.len(),
                self.cache_size.unwrap_or_default()
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "NDP_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    /// Build the library configuration: file (or defaults), then env overrides
    async fn ndp_config(&self) -> Result<NdpConfig> {
        let mut config = match &self.config_path {
            Some(path) => NdpConfig::load(path)
                .await
                .with_context(|| format!("loading {}", path))?,
            None => NdpConfig::default(),
        };

        if let Some(interfaces) = self.interfaces {
            config.interfaces = interfaces;
        }
        if let Some(size) = self.cache_size {
            config.cache.capacity = size;
        }
        if let Some(defensive) = self.defensive {
            config.cache.defensive_processing = defensive;
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_var<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{} is invalid ('{}'): {}", name, raw, e)),
        Err(_) => Ok(None),
    }
}

fn parse_static_neighbors(raw: &str) -> Result<Vec<(Ipv6Addr, LinkAddr)>> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (ip, mac) = pair
                .split_once('=')
                .ok_or_else(|| anyhow::anyhow!("NDP_STATIC_NEIGHBORS entry '{}' is not ip=mac", pair))?;
            let ip: Ipv6Addr = ip
                .parse()
                .with_context(|| format!("NDP_STATIC_NEIGHBORS address '{}'", ip))?;
            let mac: LinkAddr = mac.parse()?;
            Ok((ip, mac))
        })
        .collect()
}

/// Link that only logs what the cache asks to transmit
///
/// Packet framing belongs to the IPv6 layer of the embedding stack; the
/// daemon has no socket of its own.
struct LoggingLink;

#[async_trait]
impl NdpLink for LoggingLink {
    async fn send_solicitation(&self, ifc: InterfaceId, request: SolicitationRequest) -> ndp_core::Result<()> {
        info!(
            "NS on interface {}: target {} -> {} ({})",
            ifc,
            request.target,
            request.destination,
            request
                .link_addr
                .map(|addr| addr.to_string())
                .unwrap_or_else(|| "multicast".to_string())
        );
        Ok(())
    }

    async fn send_advertisement(&self, ifc: InterfaceId, reply: AdvertisementReply) -> ndp_core::Result<()> {
        info!(
            "NA on interface {}: target {} -> {} (S={} O={})",
            ifc, reply.target, reply.destination, reply.solicited, reply.override_flag
        );
        Ok(())
    }

    fn is_local_address(&self, _ifc: InterfaceId, _addr: &Ipv6Addr) -> bool {
        false
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return NdpExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return NdpExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return NdpExitCode::ConfigError.into();
    }

    info!("Starting ndpd daemon");

    let rt = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return NdpExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        let ndp_config = match config.ndp_config().await {
            Ok(ndp_config) => ndp_config,
            Err(e) => {
                error!("Configuration error: {:#}", e);
                return NdpExitCode::ConfigError;
            }
        };

        if let Err(e) = run_daemon(&config, ndp_config).await {
            error!("Daemon error: {:#}", e);
            NdpExitCode::RuntimeError
        } else {
            NdpExitCode::CleanShutdown
        }
    })
    .into()
}

/// Run the daemon
async fn run_daemon(config: &Config, ndp_config: NdpConfig) -> Result<()> {
    info!(
        "Configuration loaded: {} interface(s), {} entries each, defensive={}",
        ndp_config.interfaces, ndp_config.cache.capacity, ndp_config.cache.defensive_processing
    );

    let (notifier, mut events) = ChannelNotifier::new(256);
    let cache = Arc::new(NeighborCache::new(&ndp_config, Arc::new(LoggingLink))?.with_notifier(Arc::new(notifier)));

    for (ip, mac) in &config.static_neighbors {
        cache
            .set_static_or_reachable(0, *ip, *mac, NeighborState::Static)
            .await
            .with_context(|| format!("pinning {} -> {}", ip, mac))?;
        info!("Static neighbor {} -> {}", ip, mac);
    }

    let event_logger = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!(
                "Neighbor {} on interface {} -> {} ({})",
                event.ip,
                event.ifc,
                event.link_addr,
                if event.valid { "valid" } else { "removed" }
            );
        }
    });

    let engine = NdpEngine::new(Arc::clone(&cache), &ndp_config.engine)?;
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let engine_task = tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    info!("Daemon initialized successfully");

    let signal = wait_for_shutdown().await?;
    info!("Received shutdown signal: {}", signal);

    for ifc in 0..cache.interfaces() {
        let snapshot = cache.snapshot(ifc, cache.capacity());
        info!("Interface {} neighbors: {}", ifc, serde_json::to_string(&snapshot)?);
    }

    let _ = shutdown_tx.send(());
    engine_task.await??;
    event_logger.abort();

    info!("Shutting down daemon");
    Ok(())
}

/// Wait for SIGTERM or SIGINT
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for SIGINT
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
