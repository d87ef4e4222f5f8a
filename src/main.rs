use clap::Parser;
use tracing::{error, info};
use vaultgate::cli::{Args, build_config, init_logging, load_jwt_secret, open_database};
use vaultgate::{init_cleanup, run_server};

fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    // Read before the runtime starts so removing the env var is single-threaded.
    let Some(jwt_secret) = load_jwt_secret(args.jwt_secret_file.as_deref()) else {
        std::process::exit(1);
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap_or_else(|e| {
            error!(error = %e, "Failed to start runtime");
            std::process::exit(1);
        });

    runtime.block_on(serve(args, jwt_secret));
}

async fn serve(args: Args, jwt_secret: String) {
    let Some(db) = open_database(&args.database).await else {
        std::process::exit(1);
    };

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    init_cleanup(&db).await;

    let config = build_config(&args, db, jwt_secret);

    match listener.local_addr() {
        Ok(local_addr) => info!(address = %local_addr, "Listening"),
        Err(_) => info!(address = %addr, "Listening"),
    }

    if let Err(e) = run_server(config, listener).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
