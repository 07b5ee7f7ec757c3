use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use ocr_server::config::{Settings, DEFAULT_CONFIG_FILE};
use ocr_server::server::{self, AppState};
use ocr_server::{recognizer, util};
use std::{env, process};
use tracing::info;

const USAGE: &str = "usage: ./ocr-server [config file]";

fn get_args() -> String {
    let args: Vec<String> = env::args().collect();
    match args.len() {
        1 => DEFAULT_CONFIG_FILE.to_string(),
        2 => args[1].clone(),
        _ => {
            println!("{USAGE}");
            process::exit(1);
        }
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    util::init_tracing();

    let config_file = get_args();
    let settings = Settings::load(&config_file)?;
    info!("loaded settings: {settings:?}");

    let recognizer = recognizer::from_settings(&settings)?;
    info!("recognition backend: {}", recognizer.name());

    let state = web::Data::new(AppState::new(recognizer, settings.default_language.clone()));

    // Start the HTTP server
    let bind = (settings.host.clone(), settings.port);
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(middleware::Logger::default())
            .configure(server::configure)
    })
    .bind(bind.clone())
    .with_context(|| format!("failed to bind {}:{}", bind.0, bind.1))?
    .run()
    .await?;

    Ok(())
}
