use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Builder;
use tracing::debug;

use pingback::cli::{Cli, Commands};
use pingback::event::{EventParams, GlobalParams};
use pingback::http::HttpTransport;
use pingback::logging::init_logging;
use pingback::options::{follow_wait_hint, InstanceConfig, RequestOptions};
use pingback::RequestFactory;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level);

    // Controllers are single-writer state machines; one thread is all they need
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create Tokio runtime")?;

    runtime.block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    let transport = HttpTransport::new(&cli.base_url, Duration::from_millis(cli.timeout_ms))?;
    let factory = RequestFactory::new(Arc::new(transport));
    debug!("Collector base url: {}", cli.base_url);

    let finished = match cli.command {
        Commands::Send {
            url,
            method,
            params,
            wait,
            max_failures,
            follow_field,
        } => {
            let mut options = RequestOptions::new()
                .with_url(url)
                .with_method(method)
                .with_params(params.into_iter().collect())
                .with_wait(Duration::from_millis(wait));
            if let Some(field) = follow_field {
                options = options.with_continuation(follow_wait_hint(field));
            }

            let mut config = InstanceConfig::new(options);
            if let Some(max) = max_failures {
                config = config.with_max_failures(max);
            }

            let controller = factory.create(config);
            controller.send(RequestOptions::new()).await?
        }
        Commands::Track {
            event_token,
            revenue,
            currency,
            deduplication_id,
            callback_params,
            partner_params,
            max_failures,
        } => {
            let overrides = EventParams {
                event_token,
                revenue,
                currency,
                deduplication_id,
                callback_params,
                partner_params,
            }
            .into_overrides(&GlobalParams::default())?;

            let mut config = InstanceConfig::default();
            if let Some(max) = max_failures {
                config = config.with_max_failures(max);
            }

            let controller = factory.create(config);
            controller.send(overrides).await?
        }
    };

    println!("{}", serde_json::to_string_pretty(&finished)?);
    Ok(())
}
