//! Command surface of the maintenance shell.
//!
//! Every accepted command is a variant of [`Command`]; a line is parsed once and
//! dispatched by `match`. The board's short names (`hk`, `buffer`, `cal-*`) are accepted
//! as aliases of the long names.

use std::str::FromStr;
use thiserror::Error;

use crate::calibration::CalibrationGroup;
use crate::error::TelemetryError;

/// One parsed shell command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// List commands
    Help,
    /// System summary
    Status,
    /// Science sensors, optionally streaming
    Sensors {
        /// Repeat until interrupted
        stream: bool,
    },
    /// Housekeeping sensors, optionally streaming
    Housekeeping {
        /// Repeat until interrupted
        stream: bool,
    },
    /// Buffer usage
    BufferStatus,
    /// Print every buffered record
    Dump,
    /// Clear the buffer
    Erase,
    /// Print calibration parameters
    CalibrationShow,
    /// Interactive calibration walkthrough
    CalibrationStart,
    /// Set one calibration parameter
    CalibrationSet {
        /// Parameter group
        group: CalibrationGroup,
        /// Channel within the group
        channel: usize,
        /// New value
        value: f32,
    },
    /// Restore default calibration
    CalibrationReset,
    /// Bounds-check every channel
    SelfTest,
    /// Binary record stream
    Stream,
    /// Firmware information
    Version,
    /// Restart the telemetry core
    Reboot,
    /// Leave the shell
    Exit,
}

/// Static description of one command for `help`.
#[derive(Debug, Clone, Copy)]
pub struct CommandInfo {
    /// Canonical name
    pub name: &'static str,
    /// Short alias, if any
    pub alias: Option<&'static str>,
    /// Argument synopsis
    pub usage: &'static str,
    /// One-line description
    pub help: &'static str,
}

/// Every command, in help order.
pub const COMMANDS: &[CommandInfo] = &[
    CommandInfo {
        name: "help",
        alias: None,
        usage: "",
        help: "Show available commands",
    },
    CommandInfo {
        name: "status",
        alias: None,
        usage: "",
        help: "System summary",
    },
    CommandInfo {
        name: "sensors",
        alias: None,
        usage: "[--stream]",
        help: "Read science sensors",
    },
    CommandInfo {
        name: "housekeeping",
        alias: Some("hk"),
        usage: "[--stream]",
        help: "Read housekeeping sensors",
    },
    CommandInfo {
        name: "buffer-status",
        alias: Some("buffer"),
        usage: "",
        help: "Show buffer usage",
    },
    CommandInfo {
        name: "dump",
        alias: None,
        usage: "",
        help: "Dump all buffered samples",
    },
    CommandInfo {
        name: "erase",
        alias: None,
        usage: "",
        help: "Erase the buffer",
    },
    CommandInfo {
        name: "calibration-show",
        alias: Some("cal-show"),
        usage: "",
        help: "Show calibration parameters",
    },
    CommandInfo {
        name: "calibration-start",
        alias: Some("cal-start"),
        usage: "",
        help: "Interactive calibration walkthrough",
    },
    CommandInfo {
        name: "calibration-set",
        alias: Some("cal-set"),
        usage: "<group> <channel> <value>",
        help: "Set one calibration parameter",
    },
    CommandInfo {
        name: "calibration-reset",
        alias: Some("cal-reset"),
        usage: "",
        help: "Restore default calibration",
    },
    CommandInfo {
        name: "self-test",
        alias: None,
        usage: "",
        help: "Run self-test",
    },
    CommandInfo {
        name: "stream",
        alias: None,
        usage: "",
        help: "Stream framed binary records",
    },
    CommandInfo {
        name: "version",
        alias: None,
        usage: "",
        help: "Firmware version",
    },
    CommandInfo {
        name: "reboot",
        alias: None,
        usage: "",
        help: "Restart the telemetry core",
    },
    CommandInfo {
        name: "exit",
        alias: Some("quit"),
        usage: "",
        help: "Leave the shell",
    },
];

/// Why a line could not be parsed.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Empty command")]
    Empty,

    #[error("Unknown command '{0}'. Type 'help'.")]
    Unknown(String),

    #[error("Usage: {name} {usage}")]
    Usage {
        name: &'static str,
        usage: &'static str,
    },

    #[error("Invalid {what} '{value}'")]
    InvalidArgument { what: &'static str, value: String },

    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
}

fn usage(name: &'static str) -> CommandError {
    let usage = COMMANDS
        .iter()
        .find(|info| info.name == name)
        .map_or("", |info| info.usage);
    CommandError::Usage { name, usage }
}

fn stream_flag(name: &'static str, args: &[&str]) -> Result<bool, CommandError> {
    match args {
        [] => Ok(false),
        ["--stream"] => Ok(true),
        _ => Err(usage(name)),
    }
}

fn no_args(name: &'static str, args: &[&str], command: Command) -> Result<Command, CommandError> {
    if args.is_empty() {
        Ok(command)
    } else {
        Err(usage(name))
    }
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let name = words.next().ok_or(CommandError::Empty)?;
        let args: Vec<&str> = words.collect();

        match name {
            "help" => no_args("help", &args, Command::Help),
            "status" => no_args("status", &args, Command::Status),
            "sensors" => Ok(Command::Sensors {
                stream: stream_flag("sensors", &args)?,
            }),
            "housekeeping" | "hk" => Ok(Command::Housekeeping {
                stream: stream_flag("housekeeping", &args)?,
            }),
            "buffer-status" | "buffer" => no_args("buffer-status", &args, Command::BufferStatus),
            "dump" => no_args("dump", &args, Command::Dump),
            "erase" => no_args("erase", &args, Command::Erase),
            "calibration-show" | "cal-show" => {
                no_args("calibration-show", &args, Command::CalibrationShow)
            }
            "calibration-start" | "cal-start" => {
                no_args("calibration-start", &args, Command::CalibrationStart)
            }
            "calibration-set" | "cal-set" => {
                let [group, channel, value] = args[..] else {
                    return Err(usage("calibration-set"));
                };
                Ok(Command::CalibrationSet {
                    group: group.parse()?,
                    channel: channel.parse().map_err(|_| CommandError::InvalidArgument {
                        what: "channel",
                        value: channel.to_string(),
                    })?,
                    value: value.parse().map_err(|_| CommandError::InvalidArgument {
                        what: "value",
                        value: value.to_string(),
                    })?,
                })
            }
            "calibration-reset" | "cal-reset" => {
                no_args("calibration-reset", &args, Command::CalibrationReset)
            }
            "self-test" => no_args("self-test", &args, Command::SelfTest),
            "stream" => no_args("stream", &args, Command::Stream),
            "version" => no_args("version", &args, Command::Version),
            "reboot" => no_args("reboot", &args, Command::Reboot),
            "exit" | "quit" => no_args("exit", &args, Command::Exit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

/// Help text listing every command.
pub fn help_text() -> String {
    let mut out = String::from("Available commands:\n\n");
    for info in COMMANDS {
        let name = match info.alias {
            Some(alias) => format!("{} ({})", info.name, alias),
            None => info.name.to_string(),
        };
        let synopsis = if info.usage.is_empty() {
            name
        } else {
            format!("{} {}", name, info.usage)
        };
        out.push_str(&format!("  {:<48} - {}\n", synopsis, info.help));
    }
    out
}
