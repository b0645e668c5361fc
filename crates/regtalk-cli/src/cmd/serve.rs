use std::net::TcpListener;

use regtalk_core::sim::RegisterBank;

use crate::cmd::ServeArgs;
use crate::exit::{io_error, CliResult, SUCCESS};

pub fn run(args: ServeArgs) -> CliResult<i32> {
    let format = args.product.wire_format(args.message_type);
    let mut bank = args
        .set
        .iter()
        .fold(RegisterBank::new(format), |bank, (address, value)| {
            bank.with_register(*address, *value)
        });
    for address in &args.read_only {
        bank = bank.with_read_only(*address);
    }

    let listener = TcpListener::bind(&args.bind)
        .map_err(|err| io_error(&format!("cannot listen on {}", args.bind), err))?;
    let local = listener
        .local_addr()
        .map_err(|err| io_error("listener address", err))?;
    eprintln!("simulating {} target on {}", args.product, local);

    bank.serve_tcp(&listener)
        .map_err(|err| io_error("accept failed", err))?;
    Ok(SUCCESS)
}
