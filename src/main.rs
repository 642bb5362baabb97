//! Catalog Cache Daemon
//!
//! Wires the caching core against a seeded in-memory product store, warms
//! both tiers, and then idles with a periodic L1 sweep and stats log. The
//! HTTP transport lives elsewhere; this binary exists to run the core on
//! its own, against either a real Redis or fully in-process (standalone).

use catalog_cache::{
    CacheConfig, CatalogValue, JsonCodec, LocalCache, MemoryLockStore, MemoryProductStore,
    MemoryStore, MetricsSink, Product, ProductService, ProductStore, PrometheusSink,
    RedisLockStore, RedisStore, Result, SharedCache, StampedeGuard, SystemClock, TwoLevel,
};
use clap::Parser;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Catalog cache daemon - two-level product cache with stampede protection
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Shared cache connection string
    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    redis_url: String,

    /// Run fully in-process (no Redis)
    #[arg(long, env = "STANDALONE")]
    standalone: bool,

    /// Max entries in the in-process tier
    #[arg(long, env = "L1_MAX_SIZE", default_value = "10000")]
    l1_max_size: usize,

    /// Products preloaded by the warmer
    #[arg(long, env = "WARMER_TOP_N", default_value = "100")]
    warmer_top_n: usize,

    /// Stats log / sweep period in seconds
    #[arg(long, env = "SWEEP_INTERVAL", default_value = "60")]
    sweep_interval_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args);

    info!("Starting catalog cache daemon");
    info!("  Version: {}", catalog_cache::VERSION);
    info!("  Standalone: {}", args.standalone);

    let mut config = CacheConfig::default();
    config.l1.max_size = args.l1_max_size;
    config.l2.url = args.redis_url.clone();
    config.warmer.top_n = args.warmer_top_n;

    let clock = Arc::new(SystemClock);
    let registry = prometheus::Registry::new();
    let metrics: Arc<dyn MetricsSink> = Arc::new(PrometheusSink::register(&registry)?);

    // Shared tier and lock store: Redis, or in-process in standalone mode
    let (shared_store, lock_store): (
        Arc<dyn catalog_cache::SharedStore>,
        Arc<dyn catalog_cache::LockStore>,
    ) = if args.standalone {
        info!("Standalone mode: in-process shared tier and lock table");
        (
            Arc::new(MemoryStore::new(clock.clone())),
            Arc::new(MemoryLockStore::new(clock.clone())),
        )
    } else {
        let redis = RedisStore::connect(&config.l2).await?;
        let locks = RedisLockStore::new(redis.pool());
        (Arc::new(redis), Arc::new(locks))
    };

    let cache = Arc::new(TwoLevel::new(
        LocalCache::new(&config.l1, clock.clone()),
        SharedCache::new(shared_store, config.l2.connect_timeout),
        Arc::new(JsonCodec::<CatalogValue>::new()),
        Arc::new(StampedeGuard::new(
            lock_store,
            config.lock.clone(),
            metrics.clone(),
        )),
        metrics.clone(),
    ));

    let store = Arc::new(MemoryProductStore::new());
    seed_demo_catalog(store.as_ref()).await?;
    info!(products = store.len(), "Seeded demo catalog");

    let service = Arc::new(ProductService::new(
        store,
        cache,
        config.clone(),
        clock,
        metrics,
    ));

    // Warm before advertising readiness
    let summary = service.warm().await;
    if summary.failed_phases > 0 {
        warn!(failed = summary.failed_phases, "Warming finished with failed phases");
    }
    info!("Ready");

    run_until_shutdown(service, config.l1.sweep_interval.max(std::time::Duration::from_secs(1)))
        .await;

    info!("Shutdown complete");
    Ok(())
}

/// Periodic sweep + stats loop until ctrl-c
async fn run_until_shutdown(service: Arc<ProductService>, period: std::time::Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await; // first tick fires immediately

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let swept = service.sweep_l1();
                let stats = service.cache_stats();
                info!(
                    size = stats.size,
                    hits = stats.hits,
                    misses = stats.misses,
                    evictions = stats.evictions,
                    expired = stats.expired,
                    swept = swept,
                    "L1 stats"
                );
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!(error = %e, "Signal listener failed, shutting down");
                }
                break;
            }
        }
    }
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

// =============================================================================
// Demo Catalog
// =============================================================================

async fn seed_demo_catalog(store: &MemoryProductStore) -> Result<()> {
    let rows = [
        ("Trail Runner", "Lightweight trail running shoe", "shoes", "Stride", "89.99", 40),
        ("Court Classic", "All-court tennis shoe", "shoes", "Stride", "74.50", 25),
        ("Pro Racket", "Graphite tennis racket", "tennis", "Topspin", "129.00", 12),
        ("Match Balls 4x", "Pressurized match balls", "tennis", "Topspin", "9.95", 300),
        ("Summit Pack 30L", "Daypack with rain cover", "outdoor", "Crag", "59.90", 18),
        ("Ridge Jacket", "Windproof shell jacket", "outdoor", "Crag", "149.00", 9),
    ];

    for (name, description, category, brand, price, stock) in rows {
        let now = chrono::Utc::now();
        store
            .save(Product {
                id: 0,
                name: name.to_string(),
                description: description.to_string(),
                price: Decimal::from_str(price)
                    .map_err(|e| catalog_cache::Error::InvalidInput(e.to_string()))?,
                stock_quantity: stock,
                category: category.to_string(),
                brand: brand.to_string(),
                image_url: format!("https://img.example/{}.png", name.replace(' ', "-")),
                active: true,
                created_at: now,
                updated_at: now,
            })
            .await?;
    }
    Ok(())
}
