use log::{error, info};
use parking_ingestor::client::{Feed, ParkenddClient};
use parking_ingestor::config::Config;
use parking_ingestor::db::store::{self, Store};
use parking_ingestor::env_file;
use parking_ingestor::services::fake_data::{DEFAULT_SEED, FakeFeed};
use parking_ingestor::services::poll::{self, CitySelection};

fn run() -> Result<(), String> {
    // 1) Load config
    let cfg = Config::from_env()?;
    info!(
        "Config loaded (database={}, interval={}s, cities={}, feed={}, timeout={}s, fake_feed={})",
        cfg.database_path,
        cfg.poll_interval.as_secs(),
        if cfg.cities.is_empty() {
            "<all>".to_string()
        } else {
            cfg.cities.join(",")
        },
        cfg.feed_base_url,
        cfg.feed_timeout.as_secs(),
        cfg.feed_fake
    );

    // 2) Open the store; nothing runs without persistence
    let mut store = Store::open(&cfg.database_path).map_err(|e| format!("Store initialisation failed: {}", e))?;
    let known_lots = store::load_lots(store.connection()).map_err(|e| format!("Reading known lots failed: {}", e))?;
    info!("Database {} holds {} known lot(s)", store.path(), known_lots.len());

    // 3) Pick the feed
    let feed: Box<dyn Feed> = if cfg.feed_fake {
        info!("Using synthetic feed (seed {:#x})", DEFAULT_SEED);
        Box::new(FakeFeed::new(DEFAULT_SEED))
    } else {
        Box::new(ParkenddClient::new(cfg.feed_base_url.clone(), cfg.feed_timeout))
    };

    // 4) Poll loop (first cycle immediately, then steady cadence)
    let cities = CitySelection::from_list(cfg.cities);
    info!("Starting poll loop: interval={}s", cfg.poll_interval.as_secs());
    poll::run_loop(&mut store, feed.as_ref(), &cities, cfg.poll_interval);

    Ok(())
}

fn main() {
    let loaded_env = match env_file::configure_from_args(std::env::args().skip(1)) {
        Ok(info) => info,
        Err(err) => {
            eprintln!("fatal: {}", err);
            std::process::exit(1);
        }
    };

    // Init logging after environment so RUST_LOG from .env is respected.
    let default_filter = env_logger::Env::default().default_filter_or("info");
    env_logger::Builder::from_env(default_filter)
        .format_timestamp_secs()
        .init();

    if let Some(info) = loaded_env.as_ref() {
        let origin = if info.explicit { "CLI-specified" } else { "default" };
        info!("Environment loaded from {} .env file: {}", origin, info.path.display());
    }

    info!(
        "parking-ingestor {} (git {}) starting",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_TIME_GIT_HASH")
    );
    if let Err(e) = run() {
        error!("fatal: {}", e);
        std::process::exit(1);
    }
}
