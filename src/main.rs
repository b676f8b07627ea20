use clap::Parser;
use kagami::config::Config;
use kagami::proxy::ImageProxy;
use pingora_core::server::configuration::Opt;
use pingora_core::server::Server;
use std::path::PathBuf;

/// Kagami - image-transforming reverse proxy built with Cloudflare's Pingora
#[derive(Parser, Debug)]
#[command(name = "kagami")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Daemon mode
    #[arg(short = 'd', long)]
    daemon: bool,

    /// Test configuration and exit
    #[arg(long)]
    test: bool,

    /// Upgrade workers gracefully
    #[arg(long)]
    upgrade: bool,
}

fn main() {
    // Parse command-line arguments
    let args = Args::parse();

    let config = Config::from_file(&args.config).unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        std::process::exit(1);
    });
    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    kagami::logging::init_subscriber(config.logging.format)
        .expect("Failed to initialize logging subsystem");

    tracing::info!(
        config_file = %args.config.display(),
        server_address = %config.server.address,
        server_port = config.server.port,
        backend = config.backend.is_some(),
        cache_mode = ?config.cache.mode,
        "Configuration loaded successfully"
    );

    if args.test {
        tracing::info!("Configuration test passed");
        return;
    }

    // The disk cache creates its directory asynchronously; Pingora starts its
    // own runtimes later in run_forever
    let runtime = tokio::runtime::Runtime::new().expect("Failed to create startup runtime");
    let proxy = runtime
        .block_on(ImageProxy::from_config(&config))
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to build fetch chain");
            std::process::exit(1);
        });
    drop(runtime);

    // Build Pingora server options
    let opt = Opt {
        daemon: args.daemon,
        test: args.test,
        upgrade: args.upgrade,
        ..Default::default()
    };

    let mut server = Server::new(Some(opt)).expect("Failed to create Pingora server");
    server.bootstrap();

    let mut proxy_service = pingora_proxy::http_proxy_service(&server.configuration, proxy);

    let listen_addr = config.server.listen_addr();
    proxy_service.add_tcp(&listen_addr);

    tracing::info!(address = %listen_addr, "Starting Kagami image proxy");

    server.add_service(proxy_service);

    // Blocks until shutdown
    server.run_forever();
}
