mod api;
mod models;

use log::info;
use models::config::{Config, CONFIG_PATH};
use models::context::{Context, ContextPointer};
use rocket::{routes, Build, Rocket};
use simplelog::{ColorChoice, TermLogger, TerminalMode};
use std::sync::Arc;

fn build_rocket(context: ContextPointer) -> Rocket<Build> {
    rocket::build().manage(context).mount(
        "/api",
        routes![
            api::groups::groups,
            api::cache::cache_stats,
            api::cache::clear_cache
        ],
    )
}

#[rocket::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load(CONFIG_PATH)?;

    TermLogger::init(
        config.log_level_filter(),
        simplelog::Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )?;
    info!("Loaded configuration from {} and {}*", CONFIG_PATH, models::config::ENV_PREFIX);

    let context = Arc::new(Context::new(config));
    let _ = build_rocket(context).launch().await?;
    Ok(())
}
