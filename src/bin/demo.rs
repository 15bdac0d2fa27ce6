//! Demo CLI for the MAKCU driver.
//!
//! Exercises enumeration, the connect handshake, movement, clicking,
//! lock control, and live button monitoring against real hardware.

use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};

use makcu::logging::init_logging;
use makcu::{Device, MouseButton};

#[derive(Parser)]
#[command(name = "makcu-demo", about = "MAKCU mouse controller demo", version)]
struct Cli {
    /// Serial port path; auto-detected when omitted
    #[arg(short, long, global = true)]
    port: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List enumerable MAKCU devices
    List {
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Connect and print the firmware version
    Version,
    /// Watch button events for a while
    Monitor {
        /// How long to watch, in seconds
        #[arg(long, default_value_t = 10)]
        seconds: u64,
    },
    /// Click a button a number of times
    Click {
        /// LEFT, RIGHT, MIDDLE, SIDE1, or SIDE2
        button: String,
        #[arg(long, default_value_t = 1)]
        count: u32,
    },
    /// Move the cursor relatively
    Move {
        #[arg(allow_negative_numbers = true)]
        x: i32,
        #[arg(allow_negative_numbers = true)]
        y: i32,
        /// Interpolate over this many segments
        #[arg(long)]
        segments: Option<u32>,
    },
    /// Show the spoofed mouse serial
    Serial,
    /// Show cached lock states
    Locks,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    if let Command::List { json } = &cli.command {
        return list_devices(*json);
    }

    let device = Device::new();
    if !device.connect(cli.port.as_deref()) {
        return Err(format!(
            "could not connect (status: {:?})",
            device.status()
        ));
    }

    let result = dispatch(cli, &device);
    device.disconnect();
    result
}

fn list_devices(json: bool) -> Result<(), String> {
    let devices = Device::find_devices();
    if json {
        let rendered =
            serde_json::to_string_pretty(&devices).map_err(|e| e.to_string())?;
        println!("{rendered}");
        return Ok(());
    }
    if devices.is_empty() {
        println!("No MAKCU devices found");
        return Ok(());
    }
    for info in devices {
        println!(
            "{}  {:04x}:{:04x}  {}",
            info.port, info.vid, info.pid, info.description
        );
    }
    Ok(())
}

fn dispatch(cli: &Cli, device: &Device) -> Result<(), String> {
    match &cli.command {
        Command::List { .. } => unreachable!("handled before connect"),
        Command::Version => {
            let version = device.version();
            if version.is_empty() {
                return Err("device did not report a version".into());
            }
            println!("{version}");
            Ok(())
        }
        Command::Monitor { seconds } => {
            device.set_button_callback(Some(|button: MouseButton, pressed: bool| {
                println!("{button}: {}", if pressed { "pressed" } else { "released" });
            }));
            std::thread::sleep(Duration::from_secs(*seconds));
            Ok(())
        }
        Command::Click { button, count } => {
            let button = makcu::string_to_mouse_button(button);
            if button == MouseButton::Unknown {
                return Err("unknown button name".into());
            }
            for _ in 0..*count {
                if !device.click(button) {
                    return Err("click failed".into());
                }
                std::thread::sleep(Duration::from_millis(50));
            }
            Ok(())
        }
        Command::Move { x, y, segments } => {
            let ok = match segments {
                Some(segments) => device.mouse_move_smooth(*x, *y, *segments),
                None => device.mouse_move(*x, *y),
            };
            if ok {
                Ok(())
            } else {
                Err("move rejected (out of range?)".into())
            }
        }
        Command::Serial => {
            let serial = device.mouse_serial();
            if serial.is_empty() {
                return Err("device did not report a serial".into());
            }
            println!("{serial}");
            Ok(())
        }
        Command::Locks => {
            for (target, engaged) in device.lock_states() {
                println!("{target}: {}", if engaged { "locked" } else { "unlocked" });
            }
            Ok(())
        }
    }
}
