use std::{io::IsTerminal, path::Path, sync::Arc};

use eyre::WrapErr;
use forkbench_api::ApiContext;
use forkbench_interact::InteractionEngine;
use forkbench_registry::store::DB_FILE_NAME;
use forkbench_registry::{ContractRegistry, EngineType, NetworkRegistry, RegistryError, Store};
use forkbench_supervisor::ForkSupervisor;
use tracing::{Level, info};
use tracing_subscriber::{
    EnvFilter, Layer, Registry, filter::Directive, fmt, layer::SubscriberExt,
};

use crate::{
    cli::{LogColor, Options},
    utils::{init_datadir, is_memory_datadir},
};

/// Installs the global subscriber. `RUST_LOG` overrides `--log.level`.
pub fn init_tracing(opts: &Options) -> eyre::Result<()> {
    let log_filter = EnvFilter::builder()
        .with_default_directive(Directive::from(opts.log_level))
        .from_env_lossy();

    let use_color = match opts.log_color {
        LogColor::Always => true,
        LogColor::Never => false,
        LogColor::Auto => std::io::stdout().is_terminal(),
    };

    let include_target = matches!(opts.log_level, Level::DEBUG | Level::TRACE);

    let fmt_layer = fmt::layer()
        .with_target(include_target)
        .with_ansi(use_color);

    let subscriber = Registry::default().with(fmt_layer.with_filter(log_filter));
    tracing::subscriber::set_global_default(subscriber)
        .wrap_err("setting default subscriber failed")
}

/// Opens the registry store: in memory for the `memory` datadir, otherwise a
/// SQLite file inside `datadir`.
pub fn init_store(datadir: &Path) -> Result<Store, RegistryError> {
    if is_memory_datadir(datadir) {
        return Store::new(datadir, EngineType::InMemory);
    }
    init_datadir(datadir).map_err(|error| {
        RegistryError::Custom(format!(
            "cannot create data directory {}: {error}",
            datadir.display()
        ))
    })?;
    let db_path = datadir.join(DB_FILE_NAME);
    info!(path = %db_path.display(), "opening registry database");
    Store::new(&db_path, EngineType::SQL)
}

/// Builds every service the HTTP API needs.
pub fn init_context(opts: &Options) -> eyre::Result<ApiContext> {
    let store = init_store(&opts.datadir).wrap_err("failed to open the registry store")?;
    let supervisor = ForkSupervisor::new(opts.supervisor_options());
    let fallback_rpc_url = opts
        .rpc_fallback_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_owned);

    Ok(ApiContext {
        supervisor: Arc::new(supervisor),
        networks: NetworkRegistry::new(store.clone()),
        contracts: ContractRegistry::new(store),
        engine: InteractionEngine::new(opts.engine_config()),
        fallback_rpc_url,
    })
}
