//! pfxp — command-line front end for the PFXP file-transfer protocol.

use anyhow::{Context, Result};

mod commands;

fn print_usage() {
    println!("Usage: pfxp <command> [options]");
    println!();
    println!("Commands:");
    println!("  send <file> --host H [--port P] [--timeout S]");
    println!("      Send <file> to the receiver listening at H:P.");
    println!();
    println!("  receive --bind H [--port P] --out DIR [--timeout S]");
    println!("      Serve exactly one transfer on H:P, writing into DIR.");
    println!();
    println!(
        "Defaults: --port {}, --timeout {:.1}s",
        pfxp_core::config::DEFAULT_PORT,
        pfxp_core::config::DEFAULT_TIMEOUT.as_secs_f64()
    );
    println!();
    println!("Examples:");
    println!("  pfxp send photo.jpg --host 192.168.1.20");
    println!("  pfxp receive --bind 0.0.0.0 --out ./incoming");
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();

    match arg_refs.as_slice() {
        ["send", file, rest @ ..] => commands::send::run(file, rest),
        ["receive", rest @ ..] => commands::receive::run(rest),
        ["help"] | ["--help"] | ["-h"] | [] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
    .context("transfer failed")
}
