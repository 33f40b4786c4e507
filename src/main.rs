use rimagegen::{
    logger::{self, LogLevel, LoggerConfig},
    server, Config, ImageGenerator,
};

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dotenv_loaded = dotenv::dotenv().is_ok();

    let config = Config::from_env();
    let level = config
        .server
        .log_level
        .parse::<LogLevel>()
        .unwrap_or(LogLevel::Info);

    logger::init_with_config(
        LoggerConfig::new()
            .with_level(level)
            .with_file_output(&config.server.log_file),
    )?;

    if dotenv_loaded {
        log::info!("✅ .env file loaded");
    } else {
        log::warn!("⚠️  No .env file found, using system environment variables");
    }

    logger::log_startup_info(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"), &config);

    let generator = match ImageGenerator::new(config.generator.clone()) {
        Ok(generator) => generator,
        Err(e) => {
            log::error!("❌ Failed to initialize image generator: {}", e);
            return Err(e.into());
        }
    };

    server::run(config.server, generator).await?;
    Ok(())
}
