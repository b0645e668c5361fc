mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "regtalk", version, about = "Register read/write console")]
struct Cli {
    /// Output format for outcomes (stdout).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    format: OutputFormat,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "warn", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    match cmd::run(cli.command, cli.format) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regtalk_core::config::Product;

    #[test]
    fn parses_connect_overrides() {
        let cli = Cli::try_parse_from([
            "regtalk",
            "connect",
            "--product",
            "roc",
            "--address",
            "10.0.0.5",
            "--port",
            "65432",
            "--message-type",
            "0x0002",
            "--batch",
            "r 602b",
        ])
        .expect("connect args should parse");

        let Command::Connect(args) = cli.command else {
            panic!("expected connect");
        };
        assert_eq!(args.product, Some(Product::Roc));
        assert_eq!(args.address.as_deref(), Some("10.0.0.5"));
        assert_eq!(args.port, Some(65432));
        assert_eq!(args.message_type, 2);
        assert_eq!(args.timeout_ms, 2000);
        assert_eq!(args.batch.as_deref(), Some("r 602b"));
    }

    #[test]
    fn rejects_unknown_product() {
        let err = Cli::try_parse_from(["regtalk", "connect", "--product", "xyz"])
            .expect_err("unknown product should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn parses_serve_registers() {
        let cli = Cli::try_parse_from([
            "regtalk",
            "serve",
            "--bind",
            "127.0.0.1:0",
            "--set",
            "602b=0f00",
            "--set",
            "1=2",
            "--read-only",
            "602b",
        ])
        .expect("serve args should parse");

        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.set, vec![(0x602B, 0x0F00), (0x1, 0x2)]);
        assert_eq!(args.read_only, vec![0x602B]);
    }

    #[test]
    fn parses_global_format_after_subcommand() {
        let cli = Cli::try_parse_from(["regtalk", "ports", "--format", "json"])
            .expect("ports args should parse");
        assert!(matches!(cli.format, OutputFormat::Json));
    }
}
