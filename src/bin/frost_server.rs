use std::{error::Error, net::SocketAddr, sync::Arc, time::Duration};

use clap::Parser;
use env_logger::Env;
use frost::{FrameLimits, Server, ServerConfig, config};
use log::{error, info};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Listen for new connections at address
    #[arg(default_value = "0.0.0.0:3100")]
    address: SocketAddr,
    /// Largest number of elements accepted in one request
    #[arg(long, default_value_t = config::DEFAULT_MAX_ELEMENTS)]
    max_elements: usize,
    /// Largest single value, in bytes
    #[arg(long, default_value_t = config::DEFAULT_MAX_BULK_LEN)]
    max_bulk_len: usize,
    /// Largest total request payload, in bytes
    #[arg(long, default_value_t = config::DEFAULT_MAX_REQUEST_BYTES)]
    max_request_bytes: usize,
    /// Seconds a client may stay idle before it is disconnected; 0 disables
    #[arg(long, default_value_t = config::DEFAULT_READ_TIMEOUT.as_secs())]
    idle_timeout: u64,
    /// Seconds allowed for writing one reply; 0 disables
    #[arg(long, default_value_t = config::DEFAULT_WRITE_TIMEOUT.as_secs())]
    write_timeout: u64,
}

impl Cli {
    fn config(&self) -> ServerConfig {
        ServerConfig::default()
            .with_limits(FrameLimits {
                max_elements: self.max_elements,
                max_bulk_len: self.max_bulk_len,
                max_request_bytes: self.max_request_bytes,
            })
            .with_read_timeout(Some(Duration::from_secs(self.idle_timeout)))
            .with_write_timeout(Some(Duration::from_secs(self.write_timeout)))
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    info!("starting server address={}", cli.address);

    let server = Server::bind(cli.address, cli.config()).inspect_err(|e| {
        error!("cannot start tcp server address={} err={e}", cli.address);
    })?;
    let server = Arc::new(server);

    let handle = Arc::clone(&server);
    ctrlc::set_handler(move || {
        if let Err(e) = handle.stop() {
            error!("cannot stop server err={e}");
        }
    })?;

    server.start()?;
    Ok(())
}
