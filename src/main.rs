use std::{process, sync::Arc};

use sagebridge::{
    application::{
        catalog::ProductCatalogService,
        clock::{Clock, SystemClock},
        error::AppError,
        jobs::{NightlyScheduler, RefreshCoordinator},
        options::InventoryCacheOptions,
        quotes::QuotePricingService,
        repos::InventoryCacheRepo,
        shutdown::{ShutdownSignal, shutdown_channel},
    },
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, AdminState, ApiState, StoreHealth},
        memory::InMemoryInventoryCache,
        refresh_scope::ConfiguredRefreshScope,
        sources::build_source,
        telemetry,
    },
};
use tokio::try_join;
use tracing::{Dispatch, Level, debug, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Sync(_) => run_sync(settings).await,
    }
}

struct InventoryContext {
    repo: Arc<dyn InventoryCacheRepo>,
    store: StoreHealth,
    clock: Arc<dyn Clock>,
    coordinator: Arc<RefreshCoordinator>,
    options: InventoryCacheOptions,
}

async fn init_store(
    settings: &config::Settings,
) -> Result<(Arc<dyn InventoryCacheRepo>, StoreHealth), AppError> {
    let Some(database_url) = settings.database.url.as_deref() else {
        warn!(
            target = "sagebridge::bootstrap",
            "No database configured; inventory cache is kept in process memory"
        );
        return Ok((Arc::new(InMemoryInventoryCache::new()), StoreHealth::InMemory));
    };

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    let repositories = PostgresRepositories::new(pool);
    Ok((
        Arc::new(repositories.clone()),
        StoreHealth::Postgres(repositories),
    ))
}

async fn init_inventory(settings: &config::Settings) -> Result<InventoryContext, AppError> {
    let options = InventoryCacheOptions::from(&settings.inventory_cache);
    let (repo, store) = init_store(settings).await?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // Fail fast on a source that cannot be built; each cycle builds its own afterwards.
    let probe = build_source(&settings.source).await?;
    info!(
        target = "sagebridge::bootstrap",
        source = probe.name(),
        sync_time = %options.sync_time_utc,
        batching = ?options.batching,
        "Inventory source configured"
    );

    let scope = ConfiguredRefreshScope::new(
        settings.source.clone(),
        repo.clone(),
        clock.clone(),
        options.batching,
    );
    let coordinator = Arc::new(RefreshCoordinator::new(
        Arc::new(scope),
        options.refresh_timeout,
    ));

    Ok(InventoryContext {
        repo,
        store,
        clock,
        coordinator,
        options,
    })
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let inventory = init_inventory(&settings).await?;
    let (shutdown, signal) = shutdown_channel();

    let catalog = ProductCatalogService::new(
        inventory.repo.clone(),
        inventory.clock.clone(),
        inventory.options.stale_after,
    );
    let api_state = ApiState {
        catalog: catalog.clone(),
        quotes: QuotePricingService::new(catalog.clone(), settings.quotes.tax_rate),
    };
    let admin_state = AdminState {
        catalog,
        coordinator: inventory.coordinator.clone(),
        shutdown: signal.clone(),
        store: inventory.store.clone(),
    };

    if inventory.options.sync_on_startup {
        spawn_startup_refresh(&inventory, signal.clone());
    }

    let scheduler = NightlyScheduler::new(
        inventory.coordinator.clone(),
        inventory.clock.clone(),
        inventory.options.sync_time_utc,
    );
    let scheduler_handle = tokio::spawn(scheduler.run(signal.clone()));

    let servers = serve_http(&settings, api_state, admin_state, signal);
    tokio::pin!(servers);
    let result = tokio::select! {
        result = &mut servers => result,
        () = wait_for_termination() => {
            info!(target = "sagebridge::bootstrap", "Shutdown requested");
            shutdown.trigger();
            servers.await
        }
    };

    shutdown.trigger();
    match tokio::time::timeout(settings.server.graceful_shutdown, scheduler_handle).await {
        Ok(Ok(stats)) => debug!(
            target = "sagebridge::bootstrap",
            cycles = stats.cycles,
            failures = stats.failures,
            "Scheduler joined"
        ),
        Ok(Err(err)) => error!(
            target = "sagebridge::bootstrap",
            error = %err,
            "Scheduler task panicked"
        ),
        Err(_) => warn!(
            target = "sagebridge::bootstrap",
            "Scheduler did not stop within the graceful shutdown window"
        ),
    }

    result
}

fn spawn_startup_refresh(inventory: &InventoryContext, signal: ShutdownSignal) {
    let repo = inventory.repo.clone();
    let coordinator = inventory.coordinator.clone();
    tokio::spawn(async move {
        match repo.count_items().await {
            Ok(0) => {
                info!(
                    target = "sagebridge::bootstrap",
                    "Inventory cache is empty; running startup refresh"
                );
                if let Err(err) = coordinator.run_cycle(&signal).await {
                    warn!(
                        target = "sagebridge::bootstrap",
                        error = %err,
                        "Startup inventory refresh failed"
                    );
                }
            }
            Ok(count) => debug!(
                target = "sagebridge::bootstrap",
                count,
                "Inventory cache already populated; skipping startup refresh"
            ),
            Err(err) => warn!(
                target = "sagebridge::bootstrap",
                error = %err,
                "Could not inspect inventory cache at startup"
            ),
        }
    });
}

async fn run_sync(settings: config::Settings) -> Result<(), AppError> {
    let inventory = init_inventory(&settings).await?;
    let (shutdown, signal) = shutdown_channel();

    let cycle = inventory.coordinator.run_cycle(&signal);
    tokio::pin!(cycle);
    let outcome = tokio::select! {
        result = &mut cycle => result,
        () = wait_for_termination() => {
            shutdown.trigger();
            cycle.await
        }
    }?;

    info!(
        target = "sagebridge::sync",
        items = outcome.items,
        synced_at = %outcome.synced_at,
        elapsed_ms = outcome.elapsed.as_millis() as u64,
        "Inventory sync completed"
    );
    Ok(())
}

async fn serve_http(
    settings: &config::Settings,
    api_state: ApiState,
    admin_state: AdminState,
    signal: ShutdownSignal,
) -> Result<(), AppError> {
    let public_router = http::build_api_router(api_state);
    let admin_router = http::build_admin_router(admin_state);

    let public_addr = settings.server.public_addr;
    let admin_addr = settings.server.admin_addr;
    let public_listener = tokio::net::TcpListener::bind(public_addr)
        .await
        .map_err(|source| {
            AppError::from(InfraError::Bind {
                addr: public_addr,
                source,
            })
        })?;
    let admin_listener = tokio::net::TcpListener::bind(admin_addr)
        .await
        .map_err(|source| {
            AppError::from(InfraError::Bind {
                addr: admin_addr,
                source,
            })
        })?;

    info!(
        target = "sagebridge::bootstrap",
        public = %public_addr,
        admin = %admin_addr,
        "Listening"
    );

    let mut public_signal = signal.clone();
    let mut admin_signal = signal;
    let public_server = axum::serve(public_listener, public_router.into_make_service())
        .with_graceful_shutdown(async move { public_signal.cancelled().await });
    let admin_server = axum::serve(admin_listener, admin_router.into_make_service())
        .with_graceful_shutdown(async move { admin_signal.cancelled().await });

    try_join!(
        async { public_server.await },
        async { admin_server.await }
    )
    .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}

async fn wait_for_termination() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(
                target = "sagebridge::bootstrap",
                error = %err,
                "Failed to listen for ctrl-c"
            );
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(
                    target = "sagebridge::bootstrap",
                    error = %err,
                    "Failed to listen for SIGTERM"
                );
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
