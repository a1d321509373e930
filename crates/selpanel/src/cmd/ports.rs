use selpanel_transport::{available_ports, PortInfo};
use serde::Serialize;

use crate::cmd::PortsArgs;
use crate::exit::{transport_error, CliResult, SUCCESS};
use crate::output::{print_json, table, OutputFormat};

#[derive(Serialize)]
struct PortOutput {
    name: String,
    kind: &'static str,
    description: Option<String>,
}

impl From<PortInfo> for PortOutput {
    fn from(port: PortInfo) -> Self {
        Self {
            name: port.name,
            kind: port.kind,
            description: port.description,
        }
    }
}

pub fn run(_args: PortsArgs, format: OutputFormat) -> CliResult<i32> {
    let ports: Vec<PortOutput> = available_ports()
        .map_err(|err| transport_error("port enumeration failed", err))?
        .into_iter()
        .map(PortOutput::from)
        .collect();

    match format {
        OutputFormat::Json => print_json(&ports),
        OutputFormat::Raw => {
            for port in &ports {
                println!("{}", port.name);
            }
        }
        OutputFormat::Pretty => {
            if ports.is_empty() {
                println!("no serial ports found");
            }
            for port in &ports {
                match &port.description {
                    Some(description) => {
                        println!("{} ({}, {description})", port.name, port.kind)
                    }
                    None => println!("{} ({})", port.name, port.kind),
                }
            }
        }
        OutputFormat::Table => {
            let rows = ports.iter().map(|port| {
                vec![
                    port.name.clone(),
                    port.kind.to_string(),
                    port.description.clone().unwrap_or_default(),
                ]
            });
            println!("{}", table(&["PORT", "TYPE", "DESCRIPTION"], rows));
        }
    }

    Ok(SUCCESS)
}
