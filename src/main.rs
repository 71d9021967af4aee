use buildplate::init_logging;
use buildplate::session::{self, SessionOptions};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let options = SessionOptions::parse();

    init_logging()?;
    let config = options.load_config()?;
    let report = session::run(&options, &config).await;

    tracing::info!("{} on {}", report.stats, report.printer);
    for model in &report.models {
        match (&model.failure, model.errors.is_empty()) {
            (Some(reason), _) => tracing::error!("{}: failed to load: {}", model.path, reason),
            (None, true) => tracing::info!("{}: placed ({})", model.path, model.id),
            (None, false) => {
                for error in &model.errors {
                    tracing::warn!("{}: {}", model.path, error.message);
                }
            }
        }
    }

    if !report.all_placed() {
        std::process::exit(1);
    }
    Ok(())
}
