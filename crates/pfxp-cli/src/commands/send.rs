use anyhow::{Context, Result};
use pfxp_core::TransferConfig;

use super::{flag_value, parse_port, parse_timeout};

pub fn run(file: &str, args: &[&str]) -> Result<()> {
    let host = flag_value(args, "--host").context("send requires --host <address>")?;
    let port = parse_port(args, pfxp_core::config::DEFAULT_PORT)?;
    let timeout = parse_timeout(args, pfxp_core::config::DEFAULT_TIMEOUT)?;

    let config = TransferConfig { timeout, ..Default::default() };

    pfxp_core::send_file(file, &host, port, &config)?;
    println!("sent {file} to {host}:{port}");
    Ok(())
}
