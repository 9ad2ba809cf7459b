//! Emulated Battery Responder
//!
//! Answers Pylontech RS485 queries from an inverter with data from a fixed
//! telemetry snapshot:
//! - Interactive serial port selection (or command-line argument)
//! - Optional JSON config file for address, baud rate and battery profile
//! - Logs every request and response
//!
//! Usage:
//!   cargo run --example responder                              # Interactive mode
//!   cargo run --example responder -- /dev/ttyUSB0
//!   cargo run --example responder -- /dev/ttyUSB0 bridge.json
//!
//! Set RUST_LOG environment variable to control logging:
//!   RUST_LOG=debug cargo run --example responder

use inquire::Select;
use log::{error, info};
use pylon_bridge::{
    BridgeConfig, BridgeError, Bus, Responder, Result, SerialTransport, Snapshot,
};

/// Interactive serial port selection using inquire
fn select_port() -> Result<String> {
    let ports = SerialTransport::list_ports()?;

    if ports.is_empty() {
        eprintln!("No serial ports found!");
        std::process::exit(1);
    }

    let port_names: Vec<String> = ports
        .iter()
        .map(|p| format!("{} - {:?}", p.port_name, p.port_type))
        .collect();

    let selection = Select::new("Select a serial port:", port_names)
        .prompt()
        .map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Selection cancelled: {}", e),
            )
        })?;

    // Extract just the port name (before " - ")
    let port_name = selection
        .split(" - ")
        .next()
        .unwrap_or_default()
        .to_string();
    Ok(port_name)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args().nth(2) {
        Some(path) => BridgeConfig::from_file(path)?,
        None => BridgeConfig::default(),
    };

    let port_name = std::env::args()
        .nth(1)
        .map(Ok)
        .unwrap_or_else(select_port)?;

    info!(
        "Responding as battery address {} on {} @ {} baud",
        config.address, port_name, config.baud_rate
    );
    let transport = SerialTransport::with_settings(&port_name, config.baud_rate, config.timeout())?;
    let bus = Bus::new(transport);

    let snapshot = Snapshot::default();
    info!(
        "Fake SOC: {}%, Voltage: {:.1}V",
        snapshot.soc, snapshot.pack_voltage
    );
    let mut responder = Responder::new(config.address, config.battery.clone(), snapshot);

    loop {
        match responder.serve_once(&bus) {
            Ok(_) => {}
            Err(BridgeError::Io(e)) => {
                error!("Serial I/O failed: {}", e);
                return Err(BridgeError::Io(e));
            }
            Err(e) => error!("Request failed: {}", e),
        }
    }
}
