//! Bambu firmware commands.
//!
//! [`PrinterCommand`] is what actually goes over MQTT. Catalog commands are
//! translated with `PrinterCommand::from(&Command)`; most of them end up as
//! G-code lines.

use bambui_protocol::Command;
use serde_json::json;

/// Fan index of the part cooling fan in `M106 P<n>`.
pub const FAN_NUM_PART: u8 = 1;
/// Fan index of the auxiliary fan.
pub const FAN_NUM_AUX: u8 = 2;
/// Fan index of the chamber fan.
pub const FAN_NUM_CHAMBER: u8 = 3;

/// AMS target slot meaning "load from the external spool".
pub const FILAMENT_LOAD_TARGET: u8 = 255;
/// AMS target slot meaning "unload".
pub const FILAMENT_UNLOAD_TARGET: u8 = 254;
/// Nozzle temperature used while changing filament.
pub const FILAMENT_CHANGE_TEMP: u32 = 215;

/// Calibration option bit for bed levelling.
pub const CALIBRATE_BED_LEVELLING: u8 = 1 << 1;
/// Calibration option bit for vibration compensation.
pub const CALIBRATE_VIBRATION: u8 = 1 << 2;
/// Calibration option bit for motor noise cancellation.
pub const CALIBRATE_MOTOR_NOISE: u8 = 1 << 3;

/// Command to send to the printer.
#[derive(Debug, Clone, PartialEq)]
pub enum PrinterCommand {
    /// Request printer status push.
    PushAll,
    /// Start printing a project file from the SD card.
    ProjectFile {
        /// File name on the SD card.
        file_name: String,
    },
    /// Pause current print.
    PrintPause,
    /// Resume paused print.
    PrintResume,
    /// Stop current print.
    PrintStop,
    /// Set print speed level (1-4, where 4 is ludicrous).
    SetSpeed(u8),
    /// Control an LED.
    SetLed {
        /// LED node ("chamber_light" or "work_light").
        node: String,
        /// LED mode ("on", "off", "flashing").
        mode: String,
    },
    /// Send G-code.
    GcodeLine(String),
    /// Load or unload filament.
    ChangeFilament {
        /// AMS target slot.
        target: u8,
    },
    /// Run calibration routines selected by bitmask.
    Calibrate {
        /// Option bits.
        option: u8,
    },
}

impl PrinterCommand {
    /// Convert command to JSON payload.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            PrinterCommand::PushAll => json!({
                "pushing": {
                    "sequence_id": "0",
                    "command": "pushall"
                }
            }),

            PrinterCommand::ProjectFile { file_name } => json!({
                "print": {
                    "sequence_id": "0",
                    "command": "project_file",
                    "param": "Metadata/plate_1.gcode",
                    "subtask_name": file_name,
                    "url": format!("ftp://{}", file_name),
                    "bed_type": "auto",
                    "timelapse": false,
                    "bed_leveling": true,
                    "flow_cali": false,
                    "vibration_cali": true,
                    "layer_inspect": false,
                    "use_ams": false,
                    "profile_id": "0",
                    "project_id": "0",
                    "subtask_id": "0",
                    "task_id": "0"
                }
            }),

            PrinterCommand::PrintPause => print_command("pause"),
            PrinterCommand::PrintResume => print_command("resume"),
            PrinterCommand::PrintStop => print_command("stop"),

            PrinterCommand::SetSpeed(level) => json!({
                "print": {
                    "sequence_id": "0",
                    "command": "print_speed",
                    "param": level.to_string()
                }
            }),

            PrinterCommand::SetLed { node, mode } => json!({
                "system": {
                    "sequence_id": "0",
                    "command": "ledctrl",
                    "led_node": node,
                    "led_mode": mode,
                    "led_on_time": 500,
                    "led_off_time": 500,
                    "loop_times": 0,
                    "interval_time": 0
                }
            }),

            PrinterCommand::GcodeLine(gcode) => json!({
                "print": {
                    "sequence_id": "0",
                    "command": "gcode_line",
                    "param": gcode
                }
            }),

            PrinterCommand::ChangeFilament { target } => json!({
                "print": {
                    "sequence_id": "0",
                    "command": "ams_change_filament",
                    "target": target,
                    "curr_temp": FILAMENT_CHANGE_TEMP,
                    "tar_temp": FILAMENT_CHANGE_TEMP
                }
            }),

            PrinterCommand::Calibrate { option } => json!({
                "print": {
                    "sequence_id": "0",
                    "command": "calibration",
                    "option": option
                }
            }),
        }
    }
}

fn print_command(command: &str) -> serde_json::Value {
    json!({
        "print": {
            "sequence_id": "0",
            "command": command
        }
    })
}

impl From<&Command> for PrinterCommand {
    fn from(command: &Command) -> Self {
        match command {
            Command::ChamberLight { enable } => PrinterCommand::SetLed {
                node: "chamber_light".into(),
                mode: if *enable { "on" } else { "off" }.into(),
            },
            Command::ExtruderTemp { temperature } => {
                PrinterCommand::GcodeLine(format!("M104 S{}\n", temperature))
            }
            Command::BedTemp { temperature } => {
                PrinterCommand::GcodeLine(format!("M140 S{}\n", temperature))
            }
            Command::PrintSpeed { speed } => PrinterCommand::SetSpeed(speed.level()),
            Command::FanPart { speed } => fan_speed(FAN_NUM_PART, *speed),
            Command::FanAux { speed } => fan_speed(FAN_NUM_AUX, *speed),
            Command::FanChamber { speed } => fan_speed(FAN_NUM_CHAMBER, *speed),
            Command::MoveX { distance } => relative_move('X', *distance),
            Command::MoveY { distance } => relative_move('Y', *distance),
            Command::MoveZ { distance } => relative_move('Z', *distance),
            Command::MoveE { distance } => relative_move('E', *distance),
            Command::MoveHome => PrinterCommand::GcodeLine("G28\n".into()),
            Command::StopPrint => PrinterCommand::PrintStop,
            Command::PausePrint => PrinterCommand::PrintPause,
            Command::ResumePrint => PrinterCommand::PrintResume,
            Command::LoadFilament => PrinterCommand::ChangeFilament {
                target: FILAMENT_LOAD_TARGET,
            },
            Command::UnloadFilament => PrinterCommand::ChangeFilament {
                target: FILAMENT_UNLOAD_TARGET,
            },
            Command::ForceRefresh => PrinterCommand::PushAll,
            Command::Calibrate {
                bed_levelling,
                motor_noise_cancellation,
                vibration_compensation,
            } => {
                let mut option = 0;
                if *bed_levelling {
                    option |= CALIBRATE_BED_LEVELLING;
                }
                if *vibration_compensation {
                    option |= CALIBRATE_VIBRATION;
                }
                if *motor_noise_cancellation {
                    option |= CALIBRATE_MOTOR_NOISE;
                }
                PrinterCommand::Calibrate { option }
            }
            Command::UploadFile { file_name, .. } => PrinterCommand::ProjectFile {
                file_name: file_name.clone(),
            },
        }
    }
}

/// `M106` takes a 0-255 PWM duty; the catalog speaks percent, so the value
/// is scaled rather than written through. Passing the percentage unchanged
/// would cap a fan at 100/255 of full speed.
fn fan_speed(fan: u8, percent: f64) -> PrinterCommand {
    let pwm = (percent.clamp(0.0, 100.0) * 255.0 / 100.0).round() as u8;
    PrinterCommand::GcodeLine(format!("M106 P{} S{}\n", fan, pwm))
}

fn relative_move(axis: char, distance: f64) -> PrinterCommand {
    PrinterCommand::GcodeLine(format!("G91\nG0 {}{}\nG90\n", axis, distance))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bambui_protocol::SpeedLevel;

    fn gcode(command: Command) -> String {
        match PrinterCommand::from(&command) {
            PrinterCommand::GcodeLine(line) => line,
            other => panic!("expected gcode, got {other:?}"),
        }
    }

    #[test]
    fn test_push_all_command() {
        let json = PrinterCommand::from(&Command::ForceRefresh).to_json();
        assert_eq!(json["pushing"]["command"].as_str(), Some("pushall"));
    }

    #[test]
    fn test_pause_command() {
        let json = PrinterCommand::from(&Command::PausePrint).to_json();
        assert_eq!(json["print"]["command"].as_str(), Some("pause"));
    }

    #[test]
    fn test_temperature_gcode() {
        assert_eq!(
            gcode(Command::ExtruderTemp { temperature: 215.0 }),
            "M104 S215\n"
        );
        assert_eq!(gcode(Command::BedTemp { temperature: 62.5 }), "M140 S62.5\n");
    }

    #[test]
    fn test_fan_gcode() {
        assert_eq!(gcode(Command::FanPart { speed: 100.0 }), "M106 P1 S255\n");
        assert_eq!(gcode(Command::FanAux { speed: 50.0 }), "M106 P2 S128\n");
        assert_eq!(gcode(Command::FanChamber { speed: 0.0 }), "M106 P3 S0\n");
    }

    #[test]
    fn test_move_gcode() {
        assert_eq!(
            gcode(Command::MoveX { distance: 10.0 }),
            "G91\nG0 X10\nG90\n"
        );
        assert_eq!(
            gcode(Command::MoveE { distance: -2.5 }),
            "G91\nG0 E-2.5\nG90\n"
        );
        assert_eq!(gcode(Command::MoveHome), "G28\n");
    }

    #[test]
    fn test_speed_and_light() {
        let json = PrinterCommand::from(&Command::PrintSpeed {
            speed: SpeedLevel::Ludicrous,
        })
        .to_json();
        assert_eq!(json["print"]["param"].as_str(), Some("4"));

        let json = PrinterCommand::from(&Command::ChamberLight { enable: false }).to_json();
        assert_eq!(json["system"]["led_mode"].as_str(), Some("off"));
        assert_eq!(json["system"]["led_node"].as_str(), Some("chamber_light"));
    }

    #[test]
    fn test_calibration_bitmask() {
        let all = PrinterCommand::from(&Command::Calibrate {
            bed_levelling: true,
            motor_noise_cancellation: true,
            vibration_compensation: true,
        });
        assert_eq!(all, PrinterCommand::Calibrate { option: 0b1110 });

        let bed_only = PrinterCommand::from(&Command::Calibrate {
            bed_levelling: true,
            motor_noise_cancellation: false,
            vibration_compensation: false,
        });
        assert_eq!(bed_only.to_json()["print"]["option"].as_u64(), Some(2));
    }

    #[test]
    fn test_filament_targets() {
        let load = PrinterCommand::from(&Command::LoadFilament).to_json();
        assert_eq!(load["print"]["target"].as_u64(), Some(255));
        let unload = PrinterCommand::from(&Command::UnloadFilament).to_json();
        assert_eq!(unload["print"]["target"].as_u64(), Some(254));
        assert_eq!(unload["print"]["tar_temp"].as_u64(), Some(215));
    }

    #[test]
    fn test_project_file() {
        let json = PrinterCommand::from(&Command::upload_bytes("benchy.3mf", b"PK")).to_json();
        assert_eq!(json["print"]["command"].as_str(), Some("project_file"));
        assert_eq!(json["print"]["url"].as_str(), Some("ftp://benchy.3mf"));
        assert_eq!(json["print"]["subtask_name"].as_str(), Some("benchy.3mf"));
    }
}
