//! # modstate Binary
//!
//! Wires the adapters into the read API and the push ingress, keeps the
//! freshness stamps reconciled, and serves both listeners until ctrl-c.

use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use ms_api::{push_router, router, AppState};
use ms_cache_redis::RedisSettingsCache;
use ms_config::Settings;
use ms_core::traits::LogStore;
use ms_db_postgres::PgLogStore;
use ms_db_sqlite::SqliteCatalog;
use ms_freshness::{FreshnessRegistry, Reconciler, SystemClock};
use secrecy::ExposeSecret;
use sqlx::postgres::PgConnectOptions;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env may set RUST_LOG / LOG_FORMAT, so it is read before tracing starts
    let env_file = ms_config::load_env_file();
    init_tracing();
    env_file.log();
    let settings = Settings::load().context("loading settings")?;

    // 1. Stores
    let pg = &settings.postgres;
    let options = PgConnectOptions::new()
        .host(&pg.host)
        .port(pg.port)
        .username(&pg.user)
        .password(pg.password.expose_secret())
        .database(&pg.database);
    let store: Arc<dyn LogStore> = Arc::new(PgLogStore::connect(options).await?);
    let catalog = Arc::new(SqliteCatalog::open(&settings.catalog.dir));
    let cache = Arc::new(RedisSettingsCache::connect(&settings.redis.url())?);

    // 2. Freshness: seed once, then keep reconciling in the background
    let fresh = &settings.freshness;
    let registry = FreshnessRegistry::new(
        Arc::new(SystemClock),
        fresh.nuke_expiry,
        fresh.expiry_policy,
    );
    let reconciler = Reconciler::new(store.clone(), registry.clone())
        .with_interval(fresh.reconcile_interval)
        .with_query_timeout(fresh.reconcile_timeout);
    let failed = reconciler.run_once().await;
    if !failed.is_empty() {
        warn!(?failed, "initial reconciliation incomplete; retrying on the next tick");
    }
    let reconcile_task = reconciler.spawn();

    // 3. Listeners
    let state = AppState {
        store,
        catalog,
        settings: cache,
        freshness: registry.clone(),
    };
    let public = router(state, &settings.http.api_prefix);
    let push = push_router(registry);

    let public_addr = SocketAddr::from(([0, 0, 0, 0], settings.http.port));
    let push_addr = SocketAddr::from(([0, 0, 0, 0], settings.push.port));
    let public_listener = TcpListener::bind(public_addr)
        .await
        .with_context(|| format!("binding {public_addr}"))?;
    let push_listener = TcpListener::bind(push_addr)
        .await
        .with_context(|| format!("binding {push_addr}"))?;
    info!(%public_addr, %push_addr, prefix = %settings.http.api_prefix, "modstate listening");

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown requested");
                let _ = stop_tx.send(true);
            }
            Err(err) => {
                error!(error = %err, "cannot listen for ctrl-c; running until killed");
                std::future::pending::<()>().await;
            }
        }
    });

    tokio::try_join!(
        axum::serve(public_listener, public)
            .with_graceful_shutdown(stopped(stop_rx.clone()))
            .into_future(),
        axum::serve(push_listener, push)
            .with_graceful_shutdown(stopped(stop_rx))
            .into_future(),
    )
    .context("serving")?;

    reconcile_task.abort();
    info!("modstate stopped");
    Ok(())
}

/// `RUST_LOG` filters (default `info`); `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn stopped(mut rx: watch::Receiver<bool>) -> impl Future<Output = ()> {
    async move {
        let _ = rx.wait_for(|stop| *stop).await;
    }
}
