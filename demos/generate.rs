use rimagegen::{GeneratorConfig, ImageGenerator};
use std::env;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dotenv_loaded = dotenv::dotenv().is_ok();
    rimagegen::logger::init()?;
    if dotenv_loaded {
        log::info!("✅ .env file loaded");
    } else {
        log::warn!("⚠️  No .env file found");
    }

    let prompt = env::args().skip(1).collect::<Vec<_>>().join(" ");
    let generator = ImageGenerator::new(GeneratorConfig::from_env())?;

    let url = generator.generate_image(&prompt).await?;
    println!("{}", url);

    Ok(())
}
