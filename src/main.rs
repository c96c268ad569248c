use std::process;
use std::time::Duration;

use anyhow::anyhow;
use clap::{CommandFactory, Parser};
use log::{debug, LevelFilter};
use tokio::io::AsyncReadExt;

use mini_mailer::config::Config;
use mini_mailer::{submit, BuildOptions, DeliveryTarget, Socks5Dialer};

/// Reads a message on stdin and submits it over SMTP through the local
/// SOCKS5 proxy.
#[derive(Parser, Debug)]
#[command(name = "mm", version, about)]
struct Cli {
    /// Log the SMTP session
    #[arg(short = 'd')]
    debug: bool,

    /// SMTP username
    #[arg(short = 'u', default_value = "")]
    username: String,

    /// SMTP password
    #[arg(short = 'p', default_value = "")]
    password: String,

    /// YAML configuration file, replaces HOST and PORT
    #[arg(short = 'c', value_name = "FILE")]
    config: Option<String>,

    /// Port of the SOCKS5 proxy on 127.0.0.1
    #[arg(short = 'P', value_name = "PROXY_PORT")]
    proxy_port: Option<u16>,

    /// Do not add the User-Agent header
    #[arg(long)]
    no_user_agent: bool,

    /// Check the server certificate during STARTTLS
    #[arg(long)]
    verify_tls: bool,

    /// Bound on every network step, in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    #[arg(value_name = "HOST PORT")]
    positional: Vec<String>,
}

fn usage() -> ! {
    println!("{}", Cli::command().render_usage());
    process::exit(1);
}

fn init_logger(debug: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if debug {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stdout).init();
}

/// Combines the configuration file, if any, with the command line.
fn resolve(cli: &Cli) -> anyhow::Result<(DeliveryTarget, BuildOptions)> {
    let mut options = BuildOptions::default();

    let mut target = match &cli.config {
        Some(path) => {
            let config = Config::from_file(path)
                .map_err(|err| anyhow!("Error reading config file {}: {}", path, err))?;
            if let Some(user_agent) = config.user_agent {
                options.user_agent = user_agent;
            }
            config.target()
        }
        None => {
            let (host, port) = match cli.positional.as_slice() {
                [host, port] => (host, port),
                _ => usage(),
            };
            let port = port
                .parse::<u16>()
                .map_err(|_| anyhow!("Invalid port: {}", port))?;
            DeliveryTarget::new(host.clone(), port)
        }
    };

    if !cli.username.is_empty() {
        target.username = cli.username.clone();
    }
    if !cli.password.is_empty() {
        target.password = cli.password.clone();
    }
    if let Some(proxy_port) = cli.proxy_port {
        target.proxy_port = proxy_port;
    }
    if cli.verify_tls {
        target.verify_certificates = true;
    }
    if let Some(timeout) = cli.timeout {
        target.timeout = Some(Duration::from_secs(timeout));
    }
    if cli.no_user_agent {
        options.user_agent = false;
    }

    Ok((target, options))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let (target, options) = resolve(&cli)?;

    let mut input = String::new();
    tokio::io::stdin()
        .read_to_string(&mut input)
        .await
        .map_err(|err| anyhow!("Error reading message: {}", err))?;

    debug!(
        "Delivering to {}:{} through 127.0.0.1:{}",
        target.host, target.port, target.proxy_port
    );
    let dialer = Socks5Dialer::new(target.proxy_port);
    submit(&input, options, &target, &dialer).await?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    init_logger(cli.debug);

    if let Err(err) = run(cli).await {
        println!("{}", err);
        process::exit(1);
    }
    println!("Message sent successfully!");
}
