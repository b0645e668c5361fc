use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use regtalk_core::audit::CsvAuditLog;
use regtalk_core::batch::DirResolver;
use regtalk_core::config::{ConfigError, SessionConfig};
use regtalk_core::executor::{CancelFlag, Executor, Outcome, Pacing, RunSummary};
use regtalk_core::protocol::{connect, ChannelTransport};
use regtalk_core::session::Session;
use regtalk_core::SessionError;

use crate::cmd::ConnectArgs;
use crate::exit::{
    audit_error, config_error, io_error, session_error, CliError, CliResult, FAILURE, INTERNAL,
    INTERRUPTED, SUCCESS,
};
use crate::output::{print_outcome, print_summary, OutputFormat};

type ConsoleSession = Session<ChannelTransport, CsvAuditLog>;

/// What a Ctrl-C press should do
#[derive(Debug, PartialEq, Eq)]
enum Interruption {
    /// Let the current pass finish, then stop the continuous run
    StopAfterPass,
    /// End the program
    Quit,
}

/// Routes Ctrl-C: the first press during a continuous run stops it at the end
/// of the pass; any other press quits.
#[derive(Debug, Clone, Default)]
struct Interrupts {
    cancel: CancelFlag,
    continuous: Arc<AtomicBool>,
}

impl Interrupts {
    /// Arm for a batch about to run
    fn begin(&self, continuous: bool) {
        self.cancel.reset();
        self.continuous.store(continuous, Ordering::SeqCst);
    }

    fn end(&self) {
        self.continuous.store(false, Ordering::SeqCst);
    }

    fn press(&self) -> Interruption {
        if self.continuous.load(Ordering::SeqCst) && !self.cancel.is_cancelled() {
            self.cancel.cancel();
            Interruption::StopAfterPass
        } else {
            Interruption::Quit
        }
    }
}

const PROMPT: &str = "regtalk> ";

const HELP: &str = "\
Commands are separated by ';':
  r ADDR               read a register (hex)
  w ADDR VALUE         write a register and verify it (hex)
  delay=SECONDS        pause
  cont                 repeat the batch until Ctrl-C
  #text                comment, recorded in the log
  NAME                 run an alias or a batch file (NAME or NAME.txt)
Console commands:
  help                 show this text
  aliases              list aliases
  alias NAME=COMMANDS  define an alias and save it to the config
  unalias NAME         remove an alias and save the config
  exit, quit, disconnect";

/// Console-only commands, recognised before batch parsing
#[derive(Debug, PartialEq, Eq)]
enum Meta<'a> {
    Help,
    Aliases,
    Alias { name: &'a str, commands: &'a str },
    Unalias(&'a str),
    Quit,
}

fn parse_meta(line: &str) -> Option<Meta<'_>> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    match word.to_ascii_lowercase().as_str() {
        "help" | "?" if rest.is_empty() => Some(Meta::Help),
        "aliases" if rest.is_empty() => Some(Meta::Aliases),
        "exit" | "quit" | "disconnect" if rest.is_empty() => Some(Meta::Quit),
        "alias" => {
            let (name, commands) = rest.split_once('=')?;
            Some(Meta::Alias {
                name: name.trim(),
                commands: commands.trim(),
            })
        }
        "unalias" if !rest.is_empty() => Some(Meta::Unalias(rest)),
        _ => None,
    }
}

pub fn run(args: ConnectArgs, format: OutputFormat) -> CliResult<i32> {
    let config_path = args.config.clone().or_else(SessionConfig::default_path);
    let mut config = match &config_path {
        Some(path) => SessionConfig::load_or_default(path)
            .map_err(|err| config_error(&format!("cannot load {}", path.display()), err))?,
        None => SessionConfig::default(),
    };
    if let Some(product) = args.product {
        config.product = Some(product);
    }
    if let Some(address) = &args.address {
        config.address = Some(address.clone());
    }
    if let Some(port) = args.port {
        config.port = Some(port);
    }

    let product = config
        .product
        .ok_or(ConfigError::Missing("product"))
        .map_err(|err| config_error("no product", err))?;
    let target = config
        .target()
        .map_err(|err| config_error("no target", err))?;
    let wire_format = product.wire_format(args.message_type);

    let transport = connect(&target, Duration::from_millis(args.connect_timeout_ms))
        .map_err(|err| session_error("connect failed", err.into()))?;
    let log = CsvAuditLog::open(&args.log_file).map_err(|err| {
        audit_error(
            &format!("cannot open log {}", args.log_file.display()),
            err,
        )
    })?;

    let pacing = Pacing {
        settle: Duration::from_millis(args.settle_ms),
        gap: Duration::from_millis(args.gap_ms),
        timeout: Duration::from_millis(args.timeout_ms),
    };
    let resolver = match &args.batch_dir {
        Some(dir) => DirResolver::new(dir),
        None => DirResolver::current_dir(),
    };
    let mut session = Session::new(
        Executor::new(transport, wire_format).with_pacing(pacing),
        config.aliases().clone(),
        Box::new(resolver),
        log,
    );
    session
        .note(format!("connected to {} ({})", target, product))
        .map_err(|err| session_error("audit log", err))?;
    eprintln!("connected to {} ({})", target, product);

    let interrupts = Interrupts::default();
    install_ctrlc_handler(interrupts.clone())?;

    let result = match &args.batch {
        Some(batch) => run_one(&mut session, batch, &interrupts, format),
        None => console(
            &mut session,
            &mut config,
            config_path.as_deref(),
            &interrupts,
            format,
        ),
    };

    let closed = close_session(session, result.is_ok());
    let code = result?;
    closed?;
    Ok(code)
}

/// Parse and run one batch with Ctrl-C routed to it
fn run_batch(
    session: &mut ConsoleSession,
    text: &str,
    interrupts: &Interrupts,
    format: OutputFormat,
) -> Result<RunSummary, SessionError> {
    let batch = session.load(text)?;
    interrupts.begin(batch.is_continuous());
    let result = session.run(&batch, &interrupts.cancel, &mut |o: &Outcome| {
        print_outcome(o, format)
    });
    interrupts.end();
    result
}

fn run_one(
    session: &mut ConsoleSession,
    batch: &str,
    interrupts: &Interrupts,
    format: OutputFormat,
) -> CliResult<i32> {
    let summary = run_batch(session, batch, interrupts, format)
        .map_err(|err| session_error("batch failed", err))?;
    print_summary(&summary, format);
    Ok(if summary.is_clean() { SUCCESS } else { FAILURE })
}

fn console(
    session: &mut ConsoleSession,
    config: &mut SessionConfig,
    config_path: Option<&Path>,
    interrupts: &Interrupts,
    format: OutputFormat,
) -> CliResult<i32> {
    let stdin = io::stdin();
    let interactive = stdin.is_terminal();
    let mut lines = stdin.lock().lines();

    loop {
        if interactive {
            print!("{PROMPT}");
            io::stdout()
                .flush()
                .map_err(|err| io_error("stdout", err))?;
        }

        let Some(line) = lines.next() else {
            // EOF
            return Ok(SUCCESS);
        };
        let line = line.map_err(|err| io_error("stdin", err))?;
        if line.trim().is_empty() {
            continue;
        }

        if let Some(meta) = parse_meta(&line) {
            if meta == Meta::Quit {
                return Ok(SUCCESS);
            }
            if let Err(err) = handle_meta(meta, session, config, config_path) {
                eprintln!("error: {err:#}");
            }
            continue;
        }

        match run_batch(session, &line, interrupts, format) {
            Ok(summary) => print_summary(&summary, format),
            Err(err) if !err.is_fatal() => eprintln!("error: {err}"),
            Err(err) => return Err(session_error("session ended", err)),
        }
    }
}

fn handle_meta(
    meta: Meta<'_>,
    session: &mut ConsoleSession,
    config: &mut SessionConfig,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    match meta {
        Meta::Help => println!("{HELP}"),
        Meta::Aliases => {
            if session.aliases().is_empty() {
                println!("no aliases defined");
            }
            for (name, commands) in session.aliases().iter() {
                println!("{name}={commands}");
            }
        }
        Meta::Alias { name, commands } => {
            // Reject anything that would not parse before it is stored
            session
                .prepare(commands)
                .with_context(|| format!("alias '{name}' not defined"))?;
            config
                .add_alias(name, commands)
                .with_context(|| format!("alias '{name}' not defined"))?;
            session.aliases_mut().insert(name, commands);
            save_config(config, config_path)?;
        }
        Meta::Unalias(name) => {
            if config.remove_alias(name).is_none() && session.aliases().get(name).is_none() {
                anyhow::bail!("no alias named '{name}'");
            }
            session.aliases_mut().remove(name);
            save_config(config, config_path)?;
        }
        Meta::Quit => {}
    }
    Ok(())
}

fn save_config(config: &SessionConfig, path: Option<&Path>) -> anyhow::Result<()> {
    let path: PathBuf = path
        .map(Path::to_path_buf)
        .context("no config location; aliases apply to this session only")?;
    config
        .save(&path)
        .with_context(|| format!("cannot save {}", path.display()))?;
    tracing::info!("saved config to {}", path.display());
    Ok(())
}

fn close_session(session: ConsoleSession, clean: bool) -> CliResult<()> {
    let (transport, log) = session
        .close()
        .map_err(|err| session_error("closing session", err))?;
    let (tx_bytes, rx_bytes, tx_packets, rx_packets) = transport.get_counters();
    tracing::info!(
        "sent {} packets ({} bytes), received {} packets ({} bytes)",
        tx_packets,
        tx_bytes,
        rx_packets,
        rx_bytes
    );
    let path = log.path().display().to_string();
    log.close()
        .map_err(|err| audit_error(&format!("closing log {path}"), err))?;
    if clean {
        eprintln!("disconnected");
    }
    Ok(())
}

fn install_ctrlc_handler(interrupts: Interrupts) -> CliResult<()> {
    ctrlc::set_handler(move || match interrupts.press() {
        Interruption::StopAfterPass => {
            eprintln!("stopping after this pass (Ctrl-C again to quit)");
        }
        Interruption::Quit => {
            tracing::info!("interrupted");
            std::process::exit(INTERRUPTED);
        }
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_console_commands() {
        assert_eq!(parse_meta("help"), Some(Meta::Help));
        assert_eq!(parse_meta(" QUIT "), Some(Meta::Quit));
        assert_eq!(parse_meta("disconnect"), Some(Meta::Quit));
        assert_eq!(
            parse_meta("alias status = r 602b; r 602c"),
            Some(Meta::Alias {
                name: "status",
                commands: "r 602b; r 602c"
            })
        );
        assert_eq!(parse_meta("unalias status"), Some(Meta::Unalias("status")));
    }

    #[test]
    fn ctrlc_stops_continuous_run_then_quits() {
        let interrupts = Interrupts::default();
        interrupts.begin(true);
        assert_eq!(interrupts.press(), Interruption::StopAfterPass);
        assert!(interrupts.cancel.is_cancelled());
        assert_eq!(interrupts.press(), Interruption::Quit);
    }

    #[test]
    fn ctrlc_quits_outside_continuous_runs() {
        let interrupts = Interrupts::default();
        // Idle at the prompt
        assert_eq!(interrupts.press(), Interruption::Quit);

        // During a one-shot batch
        interrupts.begin(false);
        assert_eq!(interrupts.press(), Interruption::Quit);

        // After a continuous run has ended
        interrupts.begin(true);
        interrupts.end();
        assert_eq!(interrupts.press(), Interruption::Quit);
    }

    #[test]
    fn begin_clears_a_stale_cancel() {
        let interrupts = Interrupts::default();
        interrupts.begin(true);
        interrupts.press();
        interrupts.begin(true);
        assert!(!interrupts.cancel.is_cancelled());
    }

    #[test]
    fn batches_are_not_console_commands() {
        assert_eq!(parse_meta("r 602b"), None);
        assert_eq!(parse_meta("exit; r 1"), None);
        assert_eq!(parse_meta("alias"), None);
        assert_eq!(parse_meta("unalias"), None);
    }
}
