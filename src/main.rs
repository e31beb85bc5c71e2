use clap::Parser;
use panelsmith::config::{ServiceConfig, setup_logging};
use panelsmith::service::ComicService;
use tracing::{error, warn};

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let cli = panelsmith::cli::CliOptions::parse();

    if setup_logging(cli.debug).is_err() {
        return;
    }

    let config = ServiceConfig::from(&cli);
    if config.default_google_api_key.is_none() {
        warn!("No default Google API key set, requests must bring their own");
    }

    let http = match reqwest::Client::builder().build() {
        Ok(http) => http,
        Err(err) => {
            error!("Failed to build HTTP client: {}", err);
            return;
        }
    };

    if let Err(err) = panelsmith::web::setup_server(
        &cli.listen_address,
        cli.port,
        ComicService::new(http, config),
    )
    .await
    {
        error!("Application error: {}", err);
    }
}
