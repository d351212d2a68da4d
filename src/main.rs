use clap::Parser;
use ed25519_dalek::SigningKey;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::Arc;
use timelock_consensus::config::{self, Config};
use timelock_consensus::constants;
use timelock_consensus::dag::PhantomDag;
use timelock_consensus::finality::FinalityAccumulator;
use timelock_consensus::kernel::Kernel;
use timelock_consensus::reputation::ReputationEngine;
use timelock_consensus::shutdown::ShutdownManager;
use timelock_consensus::storage::SledConsensusStorage;
use timelock_consensus::time_oracle::AtomicTimeOracle;
use timelock_consensus::types::ParticipationTier;

#[derive(Parser, Debug)]
#[command(name = "timelock-node")]
#[command(about = "Consensus kernel node", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[arg(short, long)]
    verbose: bool,

    #[arg(long)]
    generate_config: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Ok(hostname) = hostname::get() {
        if let Ok(hostname_str) = hostname.into_string() {
            let short_name = hostname_str.split('.').next().unwrap_or(&hostname_str);
            eprintln!("\n╔═══════════════════════════════════════════╗");
            eprintln!("║  🖥️  NODE: {:<30} ║", short_name);
            eprintln!("╚═══════════════════════════════════════════╝\n");
        }
    }

    if args.generate_config {
        let config = Config::default();
        match config.save_to_file(&args.config) {
            Ok(_) => {
                println!("✓ Generated default config at: {}", args.config);
                return;
            }
            Err(e) => {
                eprintln!("✗ Failed to generate config: {}", e);
                std::process::exit(1);
            }
        }
    }

    let config = match Config::load_or_create(&args.config) {
        Ok(cfg) => {
            println!("✓ Loaded configuration from {}", args.config);
            cfg
        }
        Err(e) => {
            eprintln!("✗ Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    setup_logging(&config.logging, args.verbose);

    let version = env!("CARGO_PKG_VERSION");
    tracing::info!(version, node = config.node.name, tier = config.node.tier, "starting consensus kernel node");

    let mut shutdown_manager = ShutdownManager::new();
    let shutdown_token = shutdown_manager.token();

    let storage = match SledConsensusStorage::open(&format!("{}/consensus", config.storage.data_dir)) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            tracing::error!(error = %e, "failed to open consensus storage");
            std::process::exit(1);
        }
    };

    let reputation_db = match sled::open(format!("{}/reputation", config.storage.data_dir)) {
        Ok(db) => Some(Arc::new(db)),
        Err(e) => {
            tracing::error!(error = %e, "failed to open reputation database");
            std::process::exit(1);
        }
    };

    let signing_key = load_or_create_node_key(&PathBuf::from(&config.storage.data_dir).join("node.key"));
    let node_id: [u8; 32] = Sha256::digest(signing_key.verifying_key().to_bytes()).into();
    tracing::info!(node_id = hex::encode(node_id), "node identity loaded");

    let tier = match config.node.tier.as_str() {
        "tier1" => ParticipationTier::Tier1,
        "tier2" => ParticipationTier::Tier2,
        _ => ParticipationTier::Tier3,
    };

    let kernel = Arc::new(Kernel::new(
        Arc::new(AtomicTimeOracle::new(Vec::new())),
        Arc::new(ReputationEngine::new(reputation_db)),
        Arc::new(PhantomDag::new(constants::dag::PHANTOM_K)),
        Arc::new(FinalityAccumulator::new(config.consensus.vdf_sample_count)),
        config.consensus.vdf_sample_count,
    ));

    tracing::info!(tier = ?tier, "kernel components wired; no network layer attached in this build");

    // No network layer in this build: report readiness and persist the
    // best-known tip periodically until asked to shut down.
    let poll_token = shutdown_token.clone();
    let poll_kernel = kernel.clone();
    let poll_storage = storage.clone();
    let poll_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_millis(config.consensus.slot_duration_ms));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Some(tip) = poll_kernel.main_chain().last().copied() {
                        if let Err(e) = poll_storage.set_best_block(tip).await {
                            tracing::warn!(error = %e, "failed to persist best block pointer");
                        }
                    }
                }
                _ = poll_token.cancelled() => break,
            }
        }
    });

    shutdown_manager.register_task(poll_handle);
    shutdown_manager.wait_for_shutdown().await;
    tracing::info!("node shut down cleanly");
}

/// Load the node's Ed25519 signing key from `path`, generating and
/// persisting a fresh one on first run.
fn load_or_create_node_key(path: &PathBuf) -> SigningKey {
    if let Ok(bytes) = std::fs::read(path) {
        if bytes.len() == 32 {
            let mut seed = [0u8; 32];
            seed.copy_from_slice(&bytes);
            return SigningKey::from_bytes(&seed);
        }
    }

    let mut seed = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut seed);
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Err(e) = std::fs::write(path, seed) {
        tracing::warn!(error = %e, "failed to persist generated node key, it will not survive a restart");
    }
    SigningKey::from_bytes(&seed)
}

fn setup_logging(config: &config::LoggingConfig, verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if verbose { "trace" } else { &config.level };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let is_systemd = std::env::var("JOURNAL_STREAM").is_ok() || std::env::var("INVOCATION_ID").is_ok();

    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());
    let short_hostname = hostname.split('.').next().unwrap_or(&hostname).to_string();

    match config.format.as_str() {
        "json" => {
            fmt().json().with_env_filter(filter).with_thread_ids(false).init();
        }
        _ => {
            if is_systemd {
                fmt()
                    .with_env_filter(filter)
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_thread_names(false)
                    .with_file(false)
                    .with_line_number(false)
                    .without_time()
                    .compact()
                    .init();
            } else {
                fmt()
                    .with_env_filter(filter)
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_thread_names(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_timer(CustomTimer { hostname: short_hostname })
                    .compact()
                    .init();
            }
        }
    }
}

/// Custom timestamp formatter matching the teacher's daemon log line shape:
/// UTC time plus a bracketed hostname, so lines stay correlated across a
/// multi-node deployment without relying on journald's own prefix.
struct CustomTimer {
    hostname: String,
}

impl tracing_subscriber::fmt::time::FormatTime for CustomTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        use chrono::Utc;
        let now = Utc::now();
        write!(w, "{}.{:03} [{}]", now.format("%Y-%m-%d %H:%M:%S"), now.timestamp_subsec_millis(), self.hostname)
    }
}
