use clap::{Args, Subcommand};
use std::path::PathBuf;

use regtalk_core::config::Product;
use regtalk_core::executor::{DEFAULT_GAP_MS, DEFAULT_SETTLE_MS};
use regtalk_core::protocol::{DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_MESSAGE_TYPE, DEFAULT_TIMEOUT_MS};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod connect;
pub mod ports;
pub mod serve;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect to a target and run batches interactively.
    Connect(ConnectArgs),
    /// Run a simulated target on a TCP port.
    Serve(ServeArgs),
    /// List serial ports.
    Ports(PortsArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Connect(args) => connect::run(args, format),
        Command::Serve(args) => serve::run(args),
        Command::Ports(args) => ports::run(args, format),
    }
}

#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// Session config file. Default: <config dir>/regtalk/regtalk.cfg
    #[arg(long, value_name = "PATH", env = "REGTALK_CONFIG")]
    pub config: Option<PathBuf>,
    /// Product class (DRX, TOC, ROC, DWG); overrides the config.
    #[arg(long, value_parser = parse_product)]
    pub product: Option<Product>,
    /// Target host, or serial device (/dev/..., COMn); overrides the config.
    #[arg(long)]
    pub address: Option<String>,
    /// TCP port, or baud rate for a serial device; overrides the config.
    #[arg(long)]
    pub port: Option<u32>,
    /// Message type for framed packets (hex).
    #[arg(long, value_parser = parse_hex_u16, default_value_t = DEFAULT_MESSAGE_TYPE)]
    pub message_type: u16,
    /// Response timeout in milliseconds.
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_MS)]
    pub timeout_ms: u64,
    /// Delay between sending a request and reading its response.
    #[arg(long, default_value_t = DEFAULT_SETTLE_MS)]
    pub settle_ms: u64,
    /// Delay between commands, and between continuous passes.
    #[arg(long, default_value_t = DEFAULT_GAP_MS)]
    pub gap_ms: u64,
    /// TCP connect timeout in milliseconds.
    #[arg(long, default_value_t = DEFAULT_CONNECT_TIMEOUT_MS)]
    pub connect_timeout_ms: u64,
    /// CSV audit log to append to.
    #[arg(long, value_name = "PATH", default_value = "regtalk_log.csv")]
    pub log_file: PathBuf,
    /// Directory searched for batch files. Default: current directory.
    #[arg(long, value_name = "DIR")]
    pub batch_dir: Option<PathBuf>,
    /// Run this batch and exit instead of prompting.
    #[arg(long, value_name = "COMMANDS")]
    pub batch: Option<String>,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:65432")]
    pub bind: String,
    /// Product class whose wire format to speak.
    #[arg(long, value_parser = parse_product, default_value = "DRX")]
    pub product: Product,
    /// Default message type for framed replies (hex).
    #[arg(long, value_parser = parse_hex_u16, default_value_t = DEFAULT_MESSAGE_TYPE)]
    pub message_type: u16,
    /// Preset a register, ADDR=VALUE in hex. Repeatable.
    #[arg(long, value_name = "ADDR=VALUE", value_parser = parse_register)]
    pub set: Vec<(u16, u16)>,
    /// Register that ignores writes (hex). Repeatable.
    #[arg(long, value_name = "ADDR", value_parser = parse_hex_u16)]
    pub read_only: Vec<u16>,
}

#[derive(Args, Debug, Default)]
pub struct PortsArgs {}

fn parse_product(s: &str) -> Result<Product, String> {
    s.parse().map_err(|e: regtalk_core::config::ConfigError| e.to_string())
}

fn parse_hex_u16(s: &str) -> Result<u16, String> {
    let digits = s.trim();
    let digits = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
        .unwrap_or(digits);
    u16::from_str_radix(digits, 16).map_err(|e| format!("'{s}' is not a 16-bit hex value: {e}"))
}

fn parse_register(s: &str) -> Result<(u16, u16), String> {
    let (address, value) = s
        .split_once('=')
        .ok_or_else(|| format!("'{s}' is not ADDR=VALUE"))?;
    Ok((parse_hex_u16(address)?, parse_hex_u16(value)?))
}
