//! usb-printer
//!
//! Raw USB printing plugin. Runs as a JSON-lines plugin host for an
//! application shell, or as a one-shot command line tool.

use anyhow::{Context, Result, anyhow};
use clap::{ArgGroup, Parser, Subcommand};
use common::{PermissionEvents, create_permission_bridge, setup_logging};
use printer::config::{self, PluginConfig};
use printer::usb::RusbSource;
use printer::{PrinterPlugin, host};
use protocol::{ConnectPrinterArgs, PrintRawArgs, TestPrintArgs};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "usb-printer")]
#[command(author, version, about = "Raw USB printing plugin")]
#[command(long_about = "
Lists USB devices, requests access to them and writes raw bytes to their
bulk-out endpoint.

EXAMPLES:
    # Serve plugin commands as JSON lines on stdin/stdout
    usb-printer serve

    # List attached USB devices
    usb-printer list

    # Check or request access to a device
    usb-printer connect /dev/bus/usb/001/004

    # Send ESC @ followed by text
    usb-printer print /dev/bus/usb/001/004 --bytes 27,64
    usb-printer print /dev/bus/usb/001/004 --text 'Hello World'

CONFIGURATION:
    The plugin looks for configuration files in the following order:
    1. Path specified with --config
    2. ~/.config/usb-printer/config.toml
    3. /etc/usb-printer/config.toml
    4. Built-in defaults
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve plugin commands over stdin/stdout (default)
    Serve,

    /// List attached USB devices
    List,

    /// Check or request permission to open a device
    Connect {
        /// Device name as shown by `list`
        device: String,
    },

    /// Write raw bytes to a device
    #[command(group(ArgGroup::new("payload").required(true).args(["text", "bytes", "file"])))]
    Print {
        /// Device name as shown by `list`
        device: String,

        /// UTF-8 text to send
        #[arg(long)]
        text: Option<String>,

        /// Comma-separated byte values, decimal or 0x-prefixed hex
        #[arg(long, value_name = "LIST")]
        bytes: Option<String>,

        /// File whose contents are sent as-is
        #[arg(long, value_name = "PATH")]
        file: Option<PathBuf>,
    },

    /// Diagnostic no-op
    Test {
        value: Option<String>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.save_config {
        let config = PluginConfig::default();
        let path = PluginConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let config = if let Some(ref path) = args.config {
        PluginConfig::load(Some(path.clone())).context("Failed to load configuration")?
    } else {
        PluginConfig::load_or_default()
    };

    let log_level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.plugin.log_level);
    config::validate_log_level(log_level)?;
    setup_logging(log_level).context("Failed to setup logging")?;

    info!("usb-printer v{}", env!("CARGO_PKG_VERSION"));

    let (notifier, events) = create_permission_bridge();
    let source = RusbSource::new(notifier).context("Failed to initialize libusb")?;
    let plugin = Arc::new(PrinterPlugin::new(
        Arc::new(source),
        config.plugin_options(),
    ));

    match args.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let runtime = tokio::runtime::Runtime::new().context("Failed to start runtime")?;
            runtime.block_on(host::serve(
                plugin,
                events,
                tokio::io::stdin(),
                tokio::io::stdout(),
            ))
        }
        Commands::List => list_mode(&plugin),
        Commands::Connect { device } => connect_mode(&plugin, &events, device),
        Commands::Print {
            device,
            text,
            bytes,
            file,
        } => {
            let data = if let Some(text) = text {
                text.into_bytes().into_iter().map(i64::from).collect()
            } else if let Some(list) = bytes {
                parse_byte_list(&list)?
            } else if let Some(path) = file {
                std::fs::read(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?
                    .into_iter()
                    .map(i64::from)
                    .collect()
            } else {
                return Err(anyhow!("No print data given"));
            };
            print_mode(&plugin, device, data)
        }
        Commands::Test { value } => {
            plugin.test_print(TestPrintArgs { value });
            println!("OK");
            Ok(())
        }
    }
}

/// List devices and exit
fn list_mode(plugin: &PrinterPlugin<RusbSource>) -> Result<()> {
    let printers = plugin.list_printers()?.printers;

    if printers.is_empty() {
        println!("No USB devices found.");
    } else {
        println!("Found {} USB device(s):\n", printers.len());
        for device in printers {
            println!("  [{}] {}", device.device_id, device.label());
            println!("      {}", device.device_name);
        }
    }
    Ok(())
}

fn connect_mode(
    plugin: &PrinterPlugin<RusbSource>,
    events: &PermissionEvents,
    device: String,
) -> Result<()> {
    let response = plugin.connect_printer(ConnectPrinterArgs {
        device_name: Some(device),
    })?;
    println!("{}", response.message);

    while let Some(event) = events.try_recv() {
        info!("Permission {:?} for {}", event.state(), event.device_name());
    }
    Ok(())
}

fn print_mode(plugin: &PrinterPlugin<RusbSource>, device: String, data: Vec<i64>) -> Result<()> {
    let requested = data.len();
    let response = plugin.print_raw(PrintRawArgs {
        device_name: Some(device),
        data: Some(data),
    })?;

    if response.bytes_written < requested {
        println!(
            "Short write: {} of {} bytes",
            response.bytes_written, requested
        );
    } else {
        println!("Wrote {} bytes", response.bytes_written);
    }
    Ok(())
}

/// Parse `27,64,0x1b` style byte lists
fn parse_byte_list(list: &str) -> Result<Vec<i64>> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            let parsed = match item.strip_prefix("0x").or_else(|| item.strip_prefix("0X")) {
                Some(hex) => i64::from_str_radix(hex, 16),
                None => item.parse::<i64>(),
            };
            parsed.with_context(|| format!("Invalid byte value '{}'", item))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_byte_list() {
        assert_eq!(
            parse_byte_list("27, 64,0x48,0X69").unwrap(),
            vec![27, 64, 0x48, 0x69]
        );
        assert_eq!(parse_byte_list("1,,2,").unwrap(), vec![1, 2]);
        assert!(parse_byte_list("27,abc").is_err());
    }

    #[test]
    fn test_print_requires_payload() {
        assert!(Args::try_parse_from(["usb-printer", "print", "USB001"]).is_err());
        assert!(
            Args::try_parse_from(["usb-printer", "print", "USB001", "--text", "a", "--bytes", "1"])
                .is_err()
        );
        let args = Args::try_parse_from(["usb-printer", "print", "USB001", "--bytes", "27,64"])
            .unwrap();
        assert!(matches!(args.command, Some(Commands::Print { .. })));
    }

    #[test]
    fn test_default_command_is_serve() {
        let args = Args::try_parse_from(["usb-printer"]).unwrap();
        assert!(args.command.is_none());
    }
}
