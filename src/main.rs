use std::env;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "Usage: dispenser serve [--config <path>]\n       dispenser verify-audit <path> [--mirror <path>]";

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = env::args().skip(1);
    match args.next().as_deref() {
        Some("serve") => serve(args).await,
        Some("verify-audit") => verify_audit(args),
        _ => usage(),
    }
}

async fn serve(mut args: impl Iterator<Item = String>) {
    let mut config_path = env::var("DISPENSER_CONFIG")
        .unwrap_or_else(|_| String::from("./config/example-config.yaml"));
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => match args.next() {
                Some(v) => config_path = v,
                None => usage(),
            },
            _ => usage(),
        }
    }

    let cfg = match dispenser_config::load_and_validate(&config_path) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("failed to load config: {e}");
            std::process::exit(1);
        }
    };
    tracing::info!(config = %config_path, store = %cfg.store.kind, "config loaded");

    if let Err(e) = dispenser_server::serve(cfg).await {
        eprintln!("server exited with error: {e}");
        std::process::exit(1);
    }
}

fn verify_audit(mut args: impl Iterator<Item = String>) {
    let Some(path) = args.next() else { usage() };
    let mut mirror = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--mirror" => match args.next() {
                Some(v) => mirror = Some(v),
                None => usage(),
            },
            _ => usage(),
        }
    }

    match dispenser_server::verify_audit_chain_with_mirror(&path, mirror.as_deref()) {
        Ok(summary) => println!("{summary}"),
        Err(e) => {
            eprintln!("audit verification failed: {e}");
            std::process::exit(1);
        }
    }
}

fn usage() -> ! {
    eprintln!("{USAGE}");
    std::process::exit(2);
}
