use tokio::net::TcpListener;
use tokio::signal;

use tickstream::config::Config;
use tickstream::state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tickstream=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env();
    print_banner(&config);

    let state = AppState::new(config.stream);
    let sessions = state.sessions.clone();
    let app = tickstream::routes::router(state);

    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .expect("failed to bind");

    let actual_port = listener
        .local_addr()
        .expect("failed to get local address")
        .port();
    eprintln!("  \x1b[32m→ listening on 0.0.0.0:{actual_port}\x1b[0m");
    eprintln!();

    // Open streams would hold graceful shutdown forever, so end them first.
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            tracing::info!("shutdown signal received");
            sessions.shutdown();
        })
        .await
        .expect("server error");
}

fn print_banner(config: &Config) {
    let version = env!("CARGO_PKG_VERSION");
    let stream = &config.stream;
    let cap = match stream.max_sessions {
        0 => "unlimited".to_string(),
        n => n.to_string(),
    };

    eprintln!();
    eprintln!("  \x1b[1;36mtickstream\x1b[0m \x1b[2mv{version}\x1b[0m");
    eprintln!();
    eprintln!("  \x1b[2mport\x1b[0m         {}", config.port);
    eprintln!("  \x1b[2mevent limit\x1b[0m  {}", stream.limit);
    eprintln!("  \x1b[2minterval\x1b[0m     {:?}", stream.tick_interval);
    eprintln!("  \x1b[2mstall after\x1b[0m  {:?}", stream.write_timeout);
    eprintln!("  \x1b[2msessions\x1b[0m     {cap}");
    eprintln!();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
