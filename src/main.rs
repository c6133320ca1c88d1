//! RustRotate - fast Tor exit rotation
//!
//! Uses the Tor ControlPort to `SIGNAL NEWNYM` instead of restarting the
//! daemon, then checks the new exit address through the SOCKS port.
//!
//! # Usage
//!
//! ```bash
//! # Rotate every 60 seconds until Ctrl-C
//! rustrotate
//!
//! # Five rotations, 30 seconds apart, with a control password
//! rustrotate -n 5 -i 30 -p hunter2
//! ```

#![allow(clippy::uninlined_format_args)]

use anyhow::Result;
use rustrotate::cli::{self, ConsoleReporter};
use rustrotate::logging;
use rustrotate::probe::SocksExitProbe;
use rustrotate::scheduler::{RotationLoop, RotationPolicy};
use rustrotate::tor::TorControlChannel;
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::parse();

    logging::init(cli.verbose);

    let config = cli.resolve_config()?;
    debug!("Resolved configuration: {:?}", config);

    let policy = RotationPolicy::from_config(&config);
    let channel = TorControlChannel::new(config.tor.clone());
    let probe = SocksExitProbe::new(&config.tor, &config.probe)?;
    let reporter = ConsoleReporter::new(cli.format);

    info!(
        "RustRotate v{} (control {}, socks {})",
        rustrotate::VERSION,
        config.tor.control_addr(),
        config.tor.socks_addr()
    );
    println!("{}", reporter.banner(&policy));

    // Ctrl-C flips the shutdown flag; the loop notices at its next await
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                debug!("Shutdown signal received");
                let _ = shutdown_tx.send(true);
            },
            Err(e) => warn!("Failed to install Ctrl+C handler: {}", e),
        }
    });

    let rotation = RotationLoop::new(policy, channel, probe, reporter);
    let summary = rotation.run(shutdown_rx).await;

    println!("{}", rotation.reporter().render_summary(&summary));

    Ok(())
}
