use std::{path::PathBuf, time::Duration};

use clap::{Arg, ArgAction, ArgMatches, ColorChoice, Command, value_parser};

pub struct Cli {
    /// Arguments passed by user
    matches: ArgMatches,
}

impl Cli {
    /// Build new command line interface
    pub fn new() -> Self {
        Self {
            matches: {
                Command::new("ubx2collector")
                    .version(env!("CARGO_PKG_VERSION"))
                    .about("U-Blox stream to remote collector forwarder")
                    .color(ColorChoice::Always)
                    .arg_required_else_help(true)
                    .next_help_heading("Serial port (Active device, GNSS module)")
                    .arg(
                        Arg::new("port")
                            .short('p')
                            .long("port")
                            .value_name("PORT")
                            .required_unless_present_any(["file"])
                            .help("Define serial port. Example /dev/ttyUSB0 on Linux")
                    )
                    .arg(
                        Arg::new("baudrate")
                            .short('b')
                            .long("baud")
                            .value_name("Baudrate (u32)")
                            .value_parser(value_parser!(u32))
                            .default_value("38400")
                            .help("Define serial port baud rate. Communications will not work if your U-Blox streams at a different data-rate."),
                    )
                    .next_help_heading("File interface (Passive mode)")
                    .arg(
                        Arg::new("file")
                            .long("file")
                            .short('f')
                            .value_name("FILENAME")
                            .action(ArgAction::Append)
                            .required_unless_present_any(["port"])
                            .conflicts_with("port")
                            .help("Replay a capture file. Use as many as needed.
Each file is consumed one after the other, load them in chronological order.
Gzip files are supported but they must be terminated with '.gz'")
                    )
                    .next_help_heading("U-Blox configuration")
                    .arg(
                        Arg::new("config")
                            .short('c')
                            .long("config")
                            .value_name("INI")
                            .value_parser(value_parser!(PathBuf))
                            .help("Receiver configuration file (INI). Each option of the selected section is written to the receiver at start-up.")
                    )
                    .arg(
                        Arg::new("comm")
                            .long("comm")
                            .value_name("SECTION")
                            .default_value("USB")
                            .help("Configuration section to apply, one per communication type (USB, UART..)")
                    )
                    .next_help_heading("Collector")
                    .arg(
                        Arg::new("location")
                            .short('l')
                            .long("location")
                            .value_name("NAME")
                            .default_value("harv")
                            .help("Station name, last component of the collector endpoints")
                    )
                    .arg(
                        Arg::new("key")
                            .short('k')
                            .long("key")
                            .value_name("PEM")
                            .required(true)
                            .value_parser(value_parser!(PathBuf))
                            .help("RSA private key (PEM) used to sign the access tokens")
                    )
                    .arg(
                        Arg::new("url")
                            .short('u')
                            .long("url")
                            .value_name("URL")
                            .default_value("http://127.0.0.1:5000/")
                            .help("Collector base URL")
                    )
                    .arg(
                        Arg::new("timeout")
                            .long("timeout")
                            .value_name("SECONDS")
                            .value_parser(value_parser!(u64))
                            .default_value("30")
                            .help("HTTP request timeout")
                    )
                    .arg(
                        Arg::new("attempts")
                            .long("attempts")
                            .value_name("N")
                            .value_parser(value_parser!(u32).range(1..))
                            .default_value("5")
                            .help("Delivery attempts before a batch is queued on disk")
                    )
                    .arg(
                        Arg::new("queue-dir")
                            .long("queue-dir")
                            .value_name("DIRECTORY")
                            .value_parser(value_parser!(PathBuf))
                            .default_value(".")
                            .help("Directory holding the undelivered batches, one file per stream")
                    )
                    .next_help_heading("Acquisition")
                    .arg(
                        Arg::new("max-pending")
                            .long("max-pending")
                            .value_name("N")
                            .value_parser(value_parser!(usize))
                            .default_value("3600")
                            .help("Position solutions retained while leap seconds are still unknown")
                    )
                    .arg(
                        Arg::new("led")
                            .long("led")
                            .value_name("GPIO")
                            .value_parser(value_parser!(u32))
                            .help("Sysfs GPIO line of the status LED. Status is only logged when omitted.")
                    )
                    .get_matches()
            },
        }
    }

    /// Returns User serial port specification
    pub fn serial_port(&self) -> Option<&String> {
        self.matches.get_one::<String>("port")
    }

    /// Input file paths
    pub fn filepaths(&self) -> Vec<String> {
        if let Some(fp) = self.matches.get_many::<String>("file") {
            fp.cloned().collect()
        } else {
            Vec::new()
        }
    }

    pub fn baud_rate(&self) -> u32 {
        *self.matches.get_one::<u32>("baudrate").unwrap_or(&38_400)
    }

    /// Receiver configuration file
    pub fn config_file(&self) -> Option<&PathBuf> {
        self.matches.get_one::<PathBuf>("config")
    }

    /// Configuration section
    pub fn comm(&self) -> &str {
        self.matches
            .get_one::<String>("comm")
            .map(|s| s.as_str())
            .unwrap_or("USB")
    }

    pub fn location(&self) -> &str {
        self.matches
            .get_one::<String>("location")
            .map(|s| s.as_str())
            .unwrap_or("harv")
    }

    pub fn key_file(&self) -> Option<&PathBuf> {
        self.matches.get_one::<PathBuf>("key")
    }

    pub fn url(&self) -> &str {
        self.matches
            .get_one::<String>("url")
            .map(|s| s.as_str())
            .unwrap_or("http://127.0.0.1:5000/")
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(*self.matches.get_one::<u64>("timeout").unwrap_or(&30))
    }

    pub fn attempts(&self) -> usize {
        self.matches.get_one::<u32>("attempts").map_or(5, |n| *n as usize)
    }

    pub fn queue_dir(&self) -> PathBuf {
        self.matches
            .get_one::<PathBuf>("queue-dir")
            .cloned()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn max_pending(&self) -> usize {
        *self.matches.get_one::<usize>("max-pending").unwrap_or(&3600)
    }

    /// Status LED GPIO line
    pub fn led(&self) -> Option<u32> {
        self.matches.get_one::<u32>("led").copied()
    }
}
