use std::sync::Arc;

use tracing::error;

use roomboard::config::{load_config, print_schema};
use roomboard::startup::{run, Credentials};
use roomboard::utils::logger::init_logging;

#[tokio::main]
async fn main() {
    if std::env::args().nth(1).as_deref() == Some("schema") {
        if let Err(e) = print_schema() {
            eprintln!("Could not render config schema: {}", e);
            std::process::exit(1);
        }
        return;
    }

    let config = Arc::new(load_config());
    if let Err(e) = init_logging(&config.logging) {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(config, Credentials::from_env()).await {
        error!(error = %e, "roomboard exited with an error");
        std::process::exit(1);
    }
}
