use clap::Parser;
use eyre::WrapErr;
use forkbench::{
    cli::CLI,
    initializers::{init_context, init_tracing},
    utils::parse_socket_addr,
};
use forkbench_api::start_api;
use tracing::{error, info};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let CLI { opts } = CLI::parse();
    init_tracing(&opts)?;

    let http_addr = parse_socket_addr(&opts.http_addr, &opts.http_port)
        .wrap_err("invalid --http.addr/--http.port")?;
    let context = init_context(&opts)?;
    let supervisor = context.supervisor.clone();

    info!(
        datadir = %opts.datadir.display(),
        anvil = %opts.anvil_bin.display(),
        "forkbench starting"
    );
    let served = start_api(http_addr, context).await;

    // The fork node must not outlive the server.
    if let Err(err) = supervisor.shutdown().await {
        error!("failed to stop the fork node: {err}");
    }
    served.wrap_err("HTTP server failed")?;
    info!("forkbench stopped");
    Ok(())
}
