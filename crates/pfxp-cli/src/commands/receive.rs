use anyhow::{Context, Result};
use pfxp_core::TransferConfig;

use super::{flag_value, parse_port, parse_timeout};

pub fn run(args: &[&str]) -> Result<()> {
    let bind = flag_value(args, "--bind").unwrap_or_else(|| "0.0.0.0".to_string());
    let port = parse_port(args, pfxp_core::config::DEFAULT_PORT)?;
    let out_dir = flag_value(args, "--out").context("receive requires --out <dir>")?;
    let timeout = parse_timeout(args, pfxp_core::config::DEFAULT_TIMEOUT)?;

    let config = TransferConfig { timeout, ..Default::default() };

    let output_path = pfxp_core::receive_one(&bind, port, &out_dir, &config)?;
    println!("{}", output_path.display());
    Ok(())
}
