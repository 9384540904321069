//! DDoS guard
//!
//! This is the main entry point. It loads the configuration, wires the
//! file-backed stores to the response engine and dispatches the requested
//! command.

use std::sync::{Arc, Mutex};

use actix_web::{web, App, HttpServer};
use anyhow::Context;
use clap::Parser;
use dotenv::dotenv;
use log::info;

use ddos_guard::api::{self, ApiState};
use ddos_guard::cli::{Cli, Command, IpArgs};
use ddos_guard::config;
use ddos_guard::core::pipeline::rng_from_seed;
use ddos_guard::core::{
    build_classifier, AlertStore, Analyzer, CaptureLimits, FileStorage, ResponseEngine, Storage,
};
use ddos_guard::models::Config;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(path) => config::load_config_from(&path.to_string_lossy()),
        None => config::load_config(),
    }
    .context("Failed to load configuration")?;

    let storage: Arc<dyn Storage> = Arc::new(FileStorage::new(config.storage.data_dir.as_str()));

    match cli.command {
        Command::Analyze(args) => {
            args.validate()?;
            let mut config = config;
            args.apply(&mut config);
            analyze(&config, storage, &args.capture)
        }
        Command::Block(args) => operator_action(&config, storage, args, true),
        Command::Unblock(args) => operator_action(&config, storage, args, false),
        Command::Blocked => {
            let engine = ResponseEngine::from_config(&config, storage);
            for entry in engine.block_list().entries().context("Failed to read block list")? {
                println!("{}", entry);
            }
            Ok(())
        }
        Command::Alerts => {
            let alerts = AlertStore::new(storage, config.storage.alert_log.as_str());
            for record in alerts.load().context("Failed to read alert store")? {
                println!(
                    "{} {} {} packets={} confidence={:.2} {}",
                    record.timestamp,
                    record.run_id,
                    record.source_address,
                    record.packet_count,
                    record.confidence,
                    record.risk_level
                );
            }
            Ok(())
        }
        Command::Serve => serve(config, storage).await,
    }
}

fn analyze(config: &Config, storage: Arc<dyn Storage>, capture: &std::path::Path) -> anyhow::Result<()> {
    let classifier = build_classifier(&config.classifier).context("Failed to load scoring model")?;
    let alerts = AlertStore::new(storage.clone(), config.storage.alert_log.as_str());
    let mut engine = ResponseEngine::from_config(config, storage);
    info!("Response mode: {}", engine.default_mode());

    let mut analyzer = Analyzer::new(
        CaptureLimits::from(&config.capture),
        classifier,
        alerts,
        rng_from_seed(config.classifier.seed),
    );
    let summary = analyzer
        .run(capture, &mut engine)
        .with_context(|| format!("Analysis of {} failed", capture.display()))?;
    println!("{}", summary);
    Ok(())
}

fn operator_action(config: &Config, storage: Arc<dyn Storage>, args: IpArgs, block: bool) -> anyhow::Result<()> {
    let mut engine = ResponseEngine::from_config(config, storage);
    let mode = args.mode(engine.default_mode());
    let actor = config.response.operator.as_str();
    let outcome = if block {
        engine.block(args.ip, mode, actor)
    } else {
        engine.unblock(args.ip, mode, actor)
    }?;
    println!("{} {}: {}", outcome.action, outcome.address, outcome.message);
    Ok(())
}

async fn serve(config: Config, storage: Arc<dyn Storage>) -> anyhow::Result<()> {
    let config = Arc::new(config);
    let engine = ResponseEngine::from_config(&config, storage.clone());

    // Create API state
    let state = web::Data::new(ApiState {
        engine: Arc::new(Mutex::new(engine)),
        alerts: AlertStore::new(storage, config.storage.alert_log.as_str()),
        config: config.clone(),
    });

    info!("Starting operator API on {}:{}", config.server.host, config.server.port);

    // Start HTTP server
    HttpServer::new(move || App::new().app_data(state.clone()).configure(api::config))
        .bind((config.server.host.as_str(), config.server.port))?
        .run()
        .await?;
    Ok(())
}
