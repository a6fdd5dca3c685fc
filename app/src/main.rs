//! Audio bridge process entry point.
//!
//! `audio-bridge options <host|rtsp://url> [port]` asks a receiver which
//! RTSP methods it supports and prints the response as JSON.

use anyhow::{bail, Context, Result};
use tracing::info;

use audiobridge_transport::{Request, RtspClient, DEFAULT_RTSP_PORT};

const USAGE: &str = "usage: audio-bridge options <host|rtsp://host[:port]> [port]";

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Where to send the probe.
#[derive(Debug, PartialEq, Eq)]
enum Target {
    Url(String),
    Host { host: String, port: u16 },
}

fn parse_target(args: &[String]) -> Result<Target> {
    match args {
        [command, target, rest @ ..] if command == "options" => {
            if target.starts_with("rtsp://") {
                if !rest.is_empty() {
                    bail!("a port cannot follow a URL\n{}", USAGE);
                }
                return Ok(Target::Url(target.clone()));
            }
            let port = match rest {
                [] => DEFAULT_RTSP_PORT,
                [port] => port
                    .parse()
                    .with_context(|| format!("invalid port '{}'", port))?,
                _ => bail!("too many arguments\n{}", USAGE),
            };
            Ok(Target::Host {
                host: target.clone(),
                port,
            })
        }
        _ => bail!("{}", USAGE),
    }
}

async fn probe(target: Target) -> Result<()> {
    let mut client = match &target {
        Target::Url(url) => RtspClient::connect_url(url).await,
        Target::Host { host, port } => RtspClient::connect(host, *port).await,
    }
    .with_context(|| format!("failed to connect to {:?}", target))?;

    info!(
        local = %client.local_address()?,
        remote = %client.remote_address()?,
        "Connected"
    );

    let response = client
        .send(&mut Request::options())
        .await
        .context("OPTIONS request failed")?;
    client.close().await?;

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let target = parse_target(&args)?;
    probe(target).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_host_with_default_port() {
        assert_eq!(
            parse_target(&args(&["options", "10.0.0.5"])).unwrap(),
            Target::Host {
                host: "10.0.0.5".to_string(),
                port: 554
            }
        );
    }

    #[test]
    fn test_host_and_port() {
        assert_eq!(
            parse_target(&args(&["options", "speaker.local", "7000"])).unwrap(),
            Target::Host {
                host: "speaker.local".to_string(),
                port: 7000
            }
        );
    }

    #[test]
    fn test_url() {
        assert_eq!(
            parse_target(&args(&["options", "rtsp://10.0.0.5:7000"])).unwrap(),
            Target::Url("rtsp://10.0.0.5:7000".to_string())
        );
    }

    #[test]
    fn test_bad_arguments() {
        assert!(parse_target(&args(&[])).is_err());
        assert!(parse_target(&args(&["play", "10.0.0.5"])).is_err());
        assert!(parse_target(&args(&["options", "10.0.0.5", "port"])).is_err());
        assert!(parse_target(&args(&["options", "rtsp://x", "1"])).is_err());
    }
}
