//! bambui CLI - send control commands to a printer through the bambui backend.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use bambui_client::{normalize_base_url, DispatchClient, HttpTransport, StaticEndpoint};
use bambui_protocol::{encode, validate, Candidate, Command, ValidCommand};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bambui")]
#[command(about = "Control a Bambu printer through the bambui backend", long_about = None)]
struct Cli {
    /// Backend address (host:port or URL)
    #[arg(long, env = "BAMBUI_BACKEND_URL", default_value = "")]
    backend: String,

    /// Printer name as configured on the backend
    #[arg(short, long, env = "BAMBUI_PRINTER_NAME")]
    printer: String,

    /// Give up on the backend after this many seconds
    #[arg(long, env = "BAMBUI_TIMEOUT_SECS")]
    timeout: Option<u64>,

    /// Print the wire message instead of sending it
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Switch the chamber light
    Light {
        #[arg(value_enum)]
        state: Toggle,
    },
    /// Set a heater target temperature (°C)
    Temp {
        #[arg(value_enum)]
        heater: Heater,
        temperature: f64,
    },
    /// Select the print speed level (1 silent .. 4 ludicrous)
    Speed { level: i64 },
    /// Set a fan speed (percent)
    Fan {
        #[arg(value_enum)]
        fan: Fan,
        speed: f64,
    },
    /// Move an axis by a relative distance (mm)
    Move {
        #[arg(value_enum)]
        axis: Axis,
        #[arg(allow_negative_numbers = true)]
        distance: f64,
    },
    /// Home all axes
    Home,
    /// Stop the running print
    Stop,
    /// Pause the running print
    Pause,
    /// Resume a paused print
    Resume,
    /// Load filament
    Load,
    /// Unload filament
    Unload,
    /// Ask the printer for a full status push
    Refresh,
    /// Run calibration routines (all enabled unless skipped)
    Calibrate {
        /// Skip bed levelling
        #[arg(long)]
        no_bed_levelling: bool,
        /// Skip motor noise cancellation
        #[arg(long)]
        no_motor_noise_cancellation: bool,
        /// Skip vibration compensation
        #[arg(long)]
        no_vibration_compensation: bool,
    },
    /// Upload a file and print it
    Upload {
        /// File to upload
        path: PathBuf,
        /// Name on the printer (default: the file's name)
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Send a raw JSON command, e.g. '{"type":"fan_part","speed":40}'
    Raw { json: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

#[derive(Clone, Copy, ValueEnum)]
enum Heater {
    Extruder,
    Bed,
}

#[derive(Clone, Copy, ValueEnum)]
enum Fan {
    Aux,
    Chamber,
    Part,
}

#[derive(Clone, Copy, ValueEnum)]
enum Axis {
    X,
    Y,
    Z,
    E,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let command = build_command(cli.command)?;
    debug!(kind = %command.kind(), "command validated");

    if cli.dry_run {
        println!("{}", encode(&command));
        return Ok(());
    }

    let mut transport = HttpTransport::new();
    if let Some(secs) = cli.timeout {
        transport = transport.with_timeout(Duration::from_secs(secs));
    }
    let resolver = StaticEndpoint::new(normalize_base_url(&cli.backend));
    let client = DispatchClient::with_transport(resolver, transport, cli.printer);

    let ack = client.send(&command).await?;
    match ack.message {
        Some(message) => println!("{message}"),
        None => println!("accepted"),
    }

    Ok(())
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();
}

/// Turn the parsed subcommand into a validated command.
fn build_command(command: Commands) -> Result<ValidCommand> {
    let candidate = match command {
        Commands::Light { state } => {
            Candidate::new("chamber_light").with("enable", matches!(state, Toggle::On))
        }
        Commands::Temp {
            heater,
            temperature,
        } => {
            let kind = match heater {
                Heater::Extruder => "extruder_temp",
                Heater::Bed => "bed_temp",
            };
            Candidate::new(kind).with("temperature", temperature)
        }
        Commands::Speed { level } => Candidate::new("print_speed").with("speed", level),
        Commands::Fan { fan, speed } => {
            let kind = match fan {
                Fan::Aux => "fan_aux",
                Fan::Chamber => "fan_chamber",
                Fan::Part => "fan_part",
            };
            Candidate::new(kind).with("speed", speed)
        }
        Commands::Move { axis, distance } => {
            let kind = match axis {
                Axis::X => "move_x",
                Axis::Y => "move_y",
                Axis::Z => "move_z",
                Axis::E => "move_e",
            };
            Candidate::new(kind).with("distance", distance)
        }
        Commands::Home => Candidate::new("move_home"),
        Commands::Stop => Candidate::new("stop_print"),
        Commands::Pause => Candidate::new("pause_print"),
        Commands::Resume => Candidate::new("resume_print"),
        Commands::Load => Candidate::new("load_filament"),
        Commands::Unload => Candidate::new("unload_filament"),
        Commands::Refresh => Candidate::new("force_refresh"),
        Commands::Calibrate {
            no_bed_levelling,
            no_motor_noise_cancellation,
            no_vibration_compensation,
        } => Candidate::new("calibrate")
            .with("bed_levelling", !no_bed_levelling)
            .with("motor_noise_cancellation", !no_motor_noise_cancellation)
            .with("vibration_compensation", !no_vibration_compensation),
        Commands::Upload { path, name } => return upload_command(&path, name),
        Commands::Raw { json } => {
            let value: serde_json::Value =
                serde_json::from_str(&json).context("raw command is not JSON")?;
            let Some(object) = value.as_object() else {
                bail!("raw command must be a JSON object");
            };
            Candidate::from_object(object.clone())
        }
    };

    Ok(validate(&candidate)?)
}

fn upload_command(path: &Path, name: Option<String>) -> Result<ValidCommand> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let file_name = name.unwrap_or_else(|| {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    });

    Ok(ValidCommand::try_from(Command::upload_bytes(file_name, &bytes))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bambui_protocol::SpeedLevel;

    fn parse(args: &[&str]) -> Result<ValidCommand> {
        let mut argv = vec!["bambui", "--printer", "workshop"];
        argv.extend_from_slice(args);
        build_command(Cli::try_parse_from(argv)?.command)
    }

    #[test]
    fn test_light() {
        let command = parse(&["light", "on"]).unwrap();
        assert_eq!(command.command(), &Command::ChamberLight { enable: true });
    }

    #[test]
    fn test_negative_move() {
        let command = parse(&["move", "z", "-5"]).unwrap();
        assert_eq!(command.command(), &Command::MoveZ { distance: -5.0 });
    }

    #[test]
    fn test_speed_domain_checked_locally() {
        assert_eq!(
            parse(&["speed", "4"]).unwrap().command(),
            &Command::PrintSpeed {
                speed: SpeedLevel::Ludicrous
            }
        );
        assert!(parse(&["speed", "5"]).is_err());
    }

    #[test]
    fn test_calibrate_flags() {
        let command = parse(&["calibrate", "--no-vibration-compensation"]).unwrap();
        assert_eq!(
            command.command(),
            &Command::Calibrate {
                bed_levelling: true,
                motor_noise_cancellation: true,
                vibration_compensation: false,
            }
        );
    }

    #[test]
    fn test_raw() {
        let command = parse(&["raw", r#"{"type":"fan_chamber","speed":20}"#]).unwrap();
        assert_eq!(command.command(), &Command::FanChamber { speed: 20.0 });
        assert!(parse(&["raw", "[]"]).is_err());
        assert!(parse(&["raw", r#"{"type":"fan_chamber","speed":-1}"#]).is_err());
    }

    #[test]
    fn test_upload_reads_file() {
        let path = std::env::temp_dir().join("bambui-cli-upload-test.gcode");
        std::fs::write(&path, b"G28\n").unwrap();
        let command = parse(&["upload", path.to_str().unwrap(), "--name", "home.gcode"]).unwrap();
        assert_eq!(command.command().file_bytes().unwrap(), b"G28\n".to_vec());
        std::fs::remove_file(&path).unwrap();
    }
}
