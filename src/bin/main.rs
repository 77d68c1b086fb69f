//! CLI tool for netpulse

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "netpulse")]
#[command(about = "Connectivity monitor: public IP, ISP, and throughput sampling with email alerting", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path (defaults to the per-user config)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Run the periodic monitoring loop (default)
    Run,
    /// Run a single monitoring cycle and print the result
    Check {
        /// Export the resulting state as a flat label/value CSV
        #[arg(long)]
        export: Option<std::path::PathBuf>,
        /// Export the (single-cycle) history as CSV
        #[arg(long)]
        history: Option<std::path::PathBuf>,
    },
    /// Measure link throughput once
    Speedtest,
    /// Continuously ping an address until interrupted
    Ping {
        /// Target host or address
        target: String,
    },
}

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use std::sync::Arc;

    use netpulse::{
        export_current_csv, AlertDispatcher, AlertTransport, Config, ConsolePresenter,
        HttpProviderClient, Monitor, MonitorConfig, NetPulseError, SmtpMailer,
    };

    env_logger::init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let providers = Arc::new(
        HttpProviderClient::with_timeout(std::time::Duration::from_secs(
            config.providers.lookup_timeout_secs,
        ))?
        .with_ip_echo_url(config.providers.ip_echo_url.clone())
        .with_isp_endpoints(config.providers.isp_endpoints.clone())
        .with_speed_servers(config.providers.speed_servers.clone()),
    );

    // Stand-in transport when SMTP credentials are absent; every delivery
    // attempt fails and is logged by the dispatcher.
    struct UnconfiguredTransport;
    impl AlertTransport for UnconfiguredTransport {
        fn deliver(&self, _message: &lettre::Message) -> netpulse::Result<()> {
            Err(NetPulseError::Alert("SMTP credentials not configured".to_string()))
        }
    }

    let transport: Box<dyn AlertTransport> = match config.alert.credentials() {
        Ok((username, password)) => Box::new(SmtpMailer::new(
            config.alert.smtp_relay.clone(),
            config.alert.smtp_port,
            username,
            password,
        )),
        Err(e) => {
            log::warn!("alert delivery disabled: {}", e);
            Box::new(UnconfiguredTransport)
        }
    };
    let dispatcher = AlertDispatcher::new(config.alert.sender.clone(), transport);

    let presenter = Arc::new(ConsolePresenter);
    let monitor = Arc::new(Monitor::new(
        MonitorConfig::from(&config),
        Arc::clone(&providers) as Arc<dyn netpulse::ProviderClient>,
        dispatcher,
        Arc::clone(&presenter) as Arc<dyn netpulse::Presenter>,
    ));

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let driver = tokio::spawn(Arc::clone(&monitor).run());
            tokio::signal::ctrl_c().await?;
            driver.abort();
            println!("monitoring stopped");
        }
        Commands::Check { export, history } => {
            let observation = {
                let monitor = Arc::clone(&monitor);
                tokio::task::spawn_blocking(move || monitor.run_cycle()).await?
            };
            if let Some(path) = export {
                export_current_csv(&path, &observation)?;
                println!("current state exported to {}", path.display());
            }
            if let Some(path) = history {
                monitor.history().export_csv(&path)?;
                println!("history exported to {}", path.display());
            }
        }
        Commands::Speedtest => match Arc::clone(&monitor).run_speed_test().await {
            Some((down, up)) => {
                println!("Download: {:.2} Mbps", down);
                println!("Upload:   {:.2} Mbps", up);
            }
            None => {
                eprintln!("speed test failed");
                std::process::exit(1);
            }
        },
        Commands::Ping { target } => {
            println!("Pinging {} (Ctrl-C to stop)", target);
            let session = netpulse::PingSession::spawn(
                target,
                Arc::clone(&presenter) as Arc<dyn netpulse::Presenter>,
            );
            tokio::signal::ctrl_c().await?;
            session.shutdown().await;
        }
    }

    Ok(())
}
