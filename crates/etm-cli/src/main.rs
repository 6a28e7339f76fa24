use tracing_subscriber::{EnvFilter, layer::SubscriberExt as _, util::SubscriberInitExt as _};

mod command;
mod config;
mod report;
mod util;

fn init_tracing() {
    let filter = EnvFilter::try_from_env("ETM_LOG").unwrap_or_else(|_| EnvFilter::new("etm=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    command::run()
}
