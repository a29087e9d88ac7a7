use std::path::PathBuf;

use anyhow::Context;
use deferra::{app::App, config::RendererConfig};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = RendererConfig::load_or_default(config_path.as_deref())
        .context("failed to load configuration")?;

    App::new(config)?.run()
}
