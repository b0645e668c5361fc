use regtalk_core::protocol::list_ports;

use crate::cmd::PortsArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_ports, OutputFormat};

pub fn run(_args: PortsArgs, format: OutputFormat) -> CliResult<i32> {
    let ports = list_ports();
    tracing::debug!("found {} serial port(s)", ports.len());
    print_ports(&ports, format);
    Ok(SUCCESS)
}
