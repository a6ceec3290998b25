use anyhow::Context;
use env_logger::Env;
use trainer::TrainConfig;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = TrainConfig::from_env();
    trainer::run(&config)
        .with_context(|| format!("training on '{}' failed", config.data_path.display()))?;

    Ok(())
}
