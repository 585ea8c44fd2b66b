use crate::cli_options::CliOptions;
use anyhow::{Result, anyhow};
use clap::Parser;
use rand::Rng;
use std::fs;
use std::io::Write;
use std::time::Duration;
use toggle_client_core::{ClientConfig, Context, ToggleClient};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod cli_options;

const DEMO_REFRESH_INTERVAL_SECONDS: u64 = 5;
const DEMO_METRICS_INTERVAL_SECONDS: u64 = 2;

#[tokio::main]
async fn main() -> Result<()> {
    let CliOptions {
        url,
        config,
        log_level,
        demo,
        sleep,
        feature,
        attrs,
    } = CliOptions::parse();

    tracing_subscriber::registry()
        .with(
            EnvFilter::builder()
                .with_default_directive(tracing::Level::from(log_level).into())
                .from_env_lossy(),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut client_config = match config {
        Some(path) => ClientConfig::from_yaml_str(&fs::read_to_string(&path)?)?,
        None => ClientConfig::new(url),
    };
    if demo {
        client_config.refresh_interval_seconds = DEMO_REFRESH_INTERVAL_SECONDS;
        client_config.metrics_interval_seconds = DEMO_METRICS_INTERVAL_SECONDS;
    }

    let client = ToggleClient::new(client_config)?;
    let context = parse_attrs(&attrs)?;

    if demo {
        run_demo(&client, &feature, &context, sleep).await;
    } else {
        let result = client.evaluate(&feature, &context).await;
        println!("{}", if result { "yes" } else { "no" });
    }
    client.close().await;
    Ok(())
}

fn parse_attrs(attrs: &[String]) -> Result<Context> {
    let mut context = Context::new();
    for attr in attrs {
        let (key, value) = attr
            .split_once('=')
            .ok_or_else(|| anyhow!("Invalid attribute '{}', expected key=val", attr))?;
        context = context.with_attribute(key, value);
    }
    Ok(context)
}

/// Substitute every `%` attribute value with a fresh random printable string.
fn randomize(context: &Context) -> Context {
    let mut rng = rand::rng();
    let mut current = Context::new();
    for (key, value) in context.attributes() {
        if value == "%" {
            let scramble: String = (0..6)
                .map(|_| rng.random_range(33u8..=126) as char)
                .collect();
            current = current.with_attribute(key, scramble);
        } else {
            current = current.with_attribute(key, value);
        }
    }
    current
}

async fn run_demo(client: &ToggleClient, feature: &str, context: &Context, sleep: f64) {
    let mut stdout = std::io::stdout();
    loop {
        let current = randomize(context);
        let result = client.evaluate(feature, &current).await;
        print!("{}", if result { '|' } else { '.' });
        let _ = stdout.flush();
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!();
                tracing::info!("Received Ctrl+C, shutting down...");
                break;
            }
            _ = tokio::time::sleep(Duration::from_secs_f64(sleep)) => {}
        }
    }
}
