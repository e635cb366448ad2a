//! Featuremap - GeoJSON feature API for an embedded map page

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};

use featuremap::{
    config::{Args, Command},
    db::{spawn_ping_task, MongoClient},
    import, logging, server,
    store::MongoFeatureStore,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    logging::init(&args.log_level, &args.log_format);

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Featuremap - GeoJSON feature API");
    info!("======================================");
    info!("Listen: {}", args.listen());
    info!("Mode: {}", if args.dev_mode() { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("Collection: {}", args.feature_collection);
    info!("Static dir: {}", args.static_dir.display());
    info!("Count cache TTL: {}s", args.count_cache_ttl_secs);
    info!("======================================");

    // A malformed URI is fatal; an unreachable server is not
    let mongo = match MongoClient::new(&args.mongo_uri, args.mongo_db.as_deref()).await {
        Ok(client) => client,
        Err(e) => {
            error!("MongoDB client setup failed: {}", e);
            std::process::exit(1);
        }
    };
    info!("MongoDB database: {}", mongo.db_name());

    if let Err(e) = mongo.ping().await {
        warn!("MongoDB unreachable at startup, serving 503s until it recovers: {}", e);
    }

    let store = MongoFeatureStore::new(mongo.clone(), &args.feature_collection);
    if mongo.is_connected() {
        store.ensure_indexes().await;
    }

    if let Some(Command::Import { path, file }) = &args.command {
        if !mongo.is_connected() {
            anyhow::bail!("cannot import {}: MongoDB is not reachable", path.display());
        }
        let inserted = import::import_file(&store, path, file.as_deref()).await?;
        info!("Imported {} features from {}", inserted, path.display());
        return Ok(());
    }

    // Indexes are (re)tried whenever the server comes back
    let index_store = store.clone();
    spawn_ping_task(mongo, args.db_ping_interval(), move || {
        let store = index_store.clone();
        async move {
            store.ensure_indexes().await;
        }
    });

    let state = Arc::new(AppState::new(args, Arc::new(store)));
    server::run(state).await?;

    info!("Featuremap stopped");
    Ok(())
}
