use tracing_subscriber::EnvFilter;

use crate::util::print_error;

mod cli;
mod util;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = argh::from_env::<cli::App>().run().await {
        print_error(format!("{e:?}"));
        std::process::exit(1);
    }
}
