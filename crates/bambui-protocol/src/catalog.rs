//! The closed catalog of printer commands.
//!
//! Every operation a client may request is one [`CommandKind`]; its payload
//! shape and value domains are declared here and nowhere else. The validator
//! and the wire codec both read their field lists from [`CommandKind::fields`].

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::ValidationError;

/// Discriminant of a printer command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Toggle the chamber light.
    ChamberLight,
    /// Set the nozzle target temperature.
    ExtruderTemp,
    /// Set the heated bed target temperature.
    BedTemp,
    /// Select the print speed profile.
    PrintSpeed,
    /// Set the auxiliary fan speed.
    FanAux,
    /// Set the chamber fan speed.
    FanChamber,
    /// Set the part cooling fan speed.
    FanPart,
    /// Relative move along X.
    MoveX,
    /// Relative move along Y.
    MoveY,
    /// Relative move along Z.
    MoveZ,
    /// Relative move of the filament feed axis.
    MoveE,
    /// Home all axes.
    MoveHome,
    /// Abort the running print.
    StopPrint,
    /// Pause the running print.
    PausePrint,
    /// Resume a paused print.
    ResumePrint,
    /// Feed filament into the extruder.
    LoadFilament,
    /// Retract filament out of the extruder.
    UnloadFilament,
    /// Ask the printer for a full status push.
    ForceRefresh,
    /// Run the selected calibration routines.
    Calibrate,
    /// Upload a file and start printing it.
    UploadFile,
}

impl CommandKind {
    /// Every kind, in catalog order.
    pub const ALL: [CommandKind; 20] = [
        CommandKind::ChamberLight,
        CommandKind::ExtruderTemp,
        CommandKind::BedTemp,
        CommandKind::PrintSpeed,
        CommandKind::FanAux,
        CommandKind::FanChamber,
        CommandKind::FanPart,
        CommandKind::MoveX,
        CommandKind::MoveY,
        CommandKind::MoveZ,
        CommandKind::MoveE,
        CommandKind::MoveHome,
        CommandKind::StopPrint,
        CommandKind::PausePrint,
        CommandKind::ResumePrint,
        CommandKind::LoadFilament,
        CommandKind::UnloadFilament,
        CommandKind::ForceRefresh,
        CommandKind::Calibrate,
        CommandKind::UploadFile,
    ];

    /// Wire name of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            CommandKind::ChamberLight => "chamber_light",
            CommandKind::ExtruderTemp => "extruder_temp",
            CommandKind::BedTemp => "bed_temp",
            CommandKind::PrintSpeed => "print_speed",
            CommandKind::FanAux => "fan_aux",
            CommandKind::FanChamber => "fan_chamber",
            CommandKind::FanPart => "fan_part",
            CommandKind::MoveX => "move_x",
            CommandKind::MoveY => "move_y",
            CommandKind::MoveZ => "move_z",
            CommandKind::MoveE => "move_e",
            CommandKind::MoveHome => "move_home",
            CommandKind::StopPrint => "stop_print",
            CommandKind::PausePrint => "pause_print",
            CommandKind::ResumePrint => "resume_print",
            CommandKind::LoadFilament => "load_filament",
            CommandKind::UnloadFilament => "unload_filament",
            CommandKind::ForceRefresh => "force_refresh",
            CommandKind::Calibrate => "calibrate",
            CommandKind::UploadFile => "upload_file",
        }
    }

    /// Payload fields declared for this kind, in catalog order.
    pub fn fields(self) -> &'static [FieldSpec] {
        const ENABLE: &[FieldSpec] = &[FieldSpec::new("enable", FieldShape::Flag)];
        const TEMPERATURE: &[FieldSpec] =
            &[FieldSpec::new("temperature", FieldShape::Temperature)];
        const SPEED_LEVEL: &[FieldSpec] = &[FieldSpec::new("speed", FieldShape::SpeedLevel)];
        const FAN: &[FieldSpec] = &[FieldSpec::new("speed", FieldShape::Percentage)];
        const MOVE: &[FieldSpec] = &[FieldSpec::new("distance", FieldShape::Distance)];
        const CALIBRATE: &[FieldSpec] = &[
            FieldSpec::new("bed_levelling", FieldShape::Flag),
            FieldSpec::new("motor_noise_cancellation", FieldShape::Flag),
            FieldSpec::new("vibration_compensation", FieldShape::Flag),
        ];
        const UPLOAD: &[FieldSpec] = &[
            FieldSpec::new("file", FieldShape::Content),
            FieldSpec::new("file_name", FieldShape::FileName),
        ];

        match self {
            CommandKind::ChamberLight => ENABLE,
            CommandKind::ExtruderTemp | CommandKind::BedTemp => TEMPERATURE,
            CommandKind::PrintSpeed => SPEED_LEVEL,
            CommandKind::FanAux | CommandKind::FanChamber | CommandKind::FanPart => FAN,
            CommandKind::MoveX | CommandKind::MoveY | CommandKind::MoveZ | CommandKind::MoveE => {
                MOVE
            }
            CommandKind::MoveHome
            | CommandKind::StopPrint
            | CommandKind::PausePrint
            | CommandKind::ResumePrint
            | CommandKind::LoadFilament
            | CommandKind::UnloadFilament
            | CommandKind::ForceRefresh => &[],
            CommandKind::Calibrate => CALIBRATE,
            CommandKind::UploadFile => UPLOAD,
        }
    }

    /// Look up a declared field by name.
    pub fn field(self, name: &str) -> Option<&'static FieldSpec> {
        self.fields().iter().find(|spec| spec.name == name)
    }

    /// Whether the printer must be idle before this command is accepted.
    ///
    /// Anything that moves the toolhead or feeds filament would collide
    /// with a running job.
    pub fn requires_idle(self) -> bool {
        matches!(
            self,
            CommandKind::MoveX
                | CommandKind::MoveY
                | CommandKind::MoveZ
                | CommandKind::MoveE
                | CommandKind::MoveHome
                | CommandKind::LoadFilament
                | CommandKind::UnloadFilament
                | CommandKind::Calibrate
                | CommandKind::UploadFile
        )
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CommandKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownKind(s.to_string()))
    }
}

/// A declared payload field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Field name on the wire.
    pub name: &'static str,
    /// Value shape and domain.
    pub shape: FieldShape,
}

impl FieldSpec {
    const fn new(name: &'static str, shape: FieldShape) -> Self {
        Self { name, shape }
    }
}

/// Shape of a payload field. Fields sharing a shape share their checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape {
    /// Boolean toggle, any value.
    Flag,
    /// Degrees Celsius, finite and non-negative.
    Temperature,
    /// Integer speed profile in 1..=4.
    SpeedLevel,
    /// Percentage in [0, 100].
    Percentage,
    /// Signed millimeters, finite.
    Distance,
    /// File content as text (plain or base64).
    Content,
    /// Non-empty file name.
    FileName,
}

impl FieldShape {
    /// JSON type expected on the wire.
    pub fn expected(self) -> &'static str {
        match self {
            FieldShape::Flag => "boolean",
            FieldShape::SpeedLevel => "integer",
            FieldShape::Temperature | FieldShape::Percentage | FieldShape::Distance => "number",
            FieldShape::Content | FieldShape::FileName => "string",
        }
    }
}

/// Print speed profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SpeedLevel {
    /// Level 1.
    Silent,
    /// Level 2.
    Standard,
    /// Level 3.
    Sport,
    /// Level 4.
    Ludicrous,
}

impl SpeedLevel {
    /// Numeric level as sent to the printer.
    pub fn level(self) -> u8 {
        match self {
            SpeedLevel::Silent => 1,
            SpeedLevel::Standard => 2,
            SpeedLevel::Sport => 3,
            SpeedLevel::Ludicrous => 4,
        }
    }
}

impl TryFrom<i64> for SpeedLevel {
    type Error = ValidationError;

    fn try_from(level: i64) -> Result<Self, Self::Error> {
        match level {
            1 => Ok(SpeedLevel::Silent),
            2 => Ok(SpeedLevel::Standard),
            3 => Ok(SpeedLevel::Sport),
            4 => Ok(SpeedLevel::Ludicrous),
            _ => Err(ValidationError::OutOfDomain {
                field: "speed".into(),
                constraint: Constraint::SpeedLevel,
            }),
        }
    }
}

/// Domain constraint a field value can violate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    /// Value must be zero or greater.
    NonNegative,
    /// Value must lie in [0, 100].
    Percentage,
    /// Value must be one of 1, 2, 3, 4.
    SpeedLevel,
    /// Value must be a finite number.
    Finite,
    /// Value must not be empty.
    NonEmpty,
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Constraint::NonNegative => "must be a non-negative number",
            Constraint::Percentage => "must be between 0 and 100",
            Constraint::SpeedLevel => "must be one of 1, 2, 3, 4",
            Constraint::Finite => "must be a finite number",
            Constraint::NonEmpty => "must not be empty",
        })
    }
}

/// A printer command with its payload.
///
/// Values may still be out of domain; only a
/// [`ValidCommand`](crate::ValidCommand) is known to satisfy the catalog.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Toggle the chamber light.
    ChamberLight {
        /// Light on or off.
        enable: bool,
    },
    /// Set the nozzle target temperature.
    ExtruderTemp {
        /// Target in °C.
        temperature: f64,
    },
    /// Set the bed target temperature.
    BedTemp {
        /// Target in °C.
        temperature: f64,
    },
    /// Select the print speed profile.
    PrintSpeed {
        /// Speed profile.
        speed: SpeedLevel,
    },
    /// Auxiliary fan speed.
    FanAux {
        /// Percent.
        speed: f64,
    },
    /// Chamber fan speed.
    FanChamber {
        /// Percent.
        speed: f64,
    },
    /// Part cooling fan speed.
    FanPart {
        /// Percent.
        speed: f64,
    },
    /// Relative X move.
    MoveX {
        /// Millimeters, signed.
        distance: f64,
    },
    /// Relative Y move.
    MoveY {
        /// Millimeters, signed.
        distance: f64,
    },
    /// Relative Z move.
    MoveZ {
        /// Millimeters, signed.
        distance: f64,
    },
    /// Relative extruder feed.
    MoveE {
        /// Millimeters, signed.
        distance: f64,
    },
    /// Home all axes.
    MoveHome,
    /// Abort the running print.
    StopPrint,
    /// Pause the running print.
    PausePrint,
    /// Resume a paused print.
    ResumePrint,
    /// Load filament.
    LoadFilament,
    /// Unload filament.
    UnloadFilament,
    /// Request a full status push.
    ForceRefresh,
    /// Run calibration routines.
    Calibrate {
        /// Bed surface levelling.
        bed_levelling: bool,
        /// Motor noise cancellation.
        motor_noise_cancellation: bool,
        /// Vibration compensation.
        vibration_compensation: bool,
    },
    /// Upload a file and print it.
    UploadFile {
        /// Content, base64 or plain text.
        file: String,
        /// Name the file is stored under.
        file_name: String,
    },
}

impl Command {
    /// Discriminant of this command.
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::ChamberLight { .. } => CommandKind::ChamberLight,
            Command::ExtruderTemp { .. } => CommandKind::ExtruderTemp,
            Command::BedTemp { .. } => CommandKind::BedTemp,
            Command::PrintSpeed { .. } => CommandKind::PrintSpeed,
            Command::FanAux { .. } => CommandKind::FanAux,
            Command::FanChamber { .. } => CommandKind::FanChamber,
            Command::FanPart { .. } => CommandKind::FanPart,
            Command::MoveX { .. } => CommandKind::MoveX,
            Command::MoveY { .. } => CommandKind::MoveY,
            Command::MoveZ { .. } => CommandKind::MoveZ,
            Command::MoveE { .. } => CommandKind::MoveE,
            Command::MoveHome => CommandKind::MoveHome,
            Command::StopPrint => CommandKind::StopPrint,
            Command::PausePrint => CommandKind::PausePrint,
            Command::ResumePrint => CommandKind::ResumePrint,
            Command::LoadFilament => CommandKind::LoadFilament,
            Command::UnloadFilament => CommandKind::UnloadFilament,
            Command::ForceRefresh => CommandKind::ForceRefresh,
            Command::Calibrate { .. } => CommandKind::Calibrate,
            Command::UploadFile { .. } => CommandKind::UploadFile,
        }
    }

    /// Upload command for binary content, stored base64 encoded.
    pub fn upload_bytes(file_name: impl Into<String>, bytes: &[u8]) -> Self {
        Command::UploadFile {
            file: STANDARD.encode(bytes),
            file_name: file_name.into(),
        }
    }

    /// Raw bytes of an upload: base64 content is decoded, anything else is
    /// taken as plain text. `None` for other kinds.
    pub fn file_bytes(&self) -> Option<Vec<u8>> {
        match self {
            Command::UploadFile { file, .. } => Some(
                STANDARD
                    .decode(file.as_bytes())
                    .unwrap_or_else(|_| file.as_bytes().to_vec()),
            ),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_roundtrip() {
        for kind in CommandKind::ALL {
            assert_eq!(kind.as_str().parse::<CommandKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_kind() {
        let err = "fan_speed".parse::<CommandKind>().unwrap_err();
        assert_eq!(err, ValidationError::UnknownKind("fan_speed".into()));
    }

    #[test]
    fn test_grouped_kinds_share_fields() {
        assert_eq!(CommandKind::FanAux.fields(), CommandKind::FanPart.fields());
        assert_eq!(CommandKind::MoveX.fields(), CommandKind::MoveE.fields());
        assert_eq!(
            CommandKind::BedTemp.fields()[0].shape,
            FieldShape::Temperature
        );
        assert!(CommandKind::StopPrint.fields().is_empty());
        assert_eq!(CommandKind::Calibrate.fields().len(), 3);
    }

    #[test]
    fn test_requires_idle() {
        assert!(CommandKind::MoveHome.requires_idle());
        assert!(CommandKind::UploadFile.requires_idle());
        assert!(!CommandKind::PausePrint.requires_idle());
        assert!(!CommandKind::ChamberLight.requires_idle());
    }

    #[test]
    fn test_speed_level() {
        assert_eq!(SpeedLevel::try_from(4).unwrap(), SpeedLevel::Ludicrous);
        assert_eq!(SpeedLevel::Sport.level(), 3);
        assert!(SpeedLevel::try_from(0).is_err());
        assert!(SpeedLevel::try_from(5).is_err());
    }

    #[test]
    fn test_file_bytes() {
        let cmd = Command::upload_bytes("cube.3mf", &[0x50, 0x4b, 0x03, 0x04]);
        assert_eq!(cmd.file_bytes().unwrap(), vec![0x50, 0x4b, 0x03, 0x04]);

        let plain = Command::UploadFile {
            file: "G28 ; not base64!".into(),
            file_name: "home.gcode".into(),
        };
        assert_eq!(plain.file_bytes().unwrap(), b"G28 ; not base64!".to_vec());
        assert_eq!(Command::MoveHome.file_bytes(), None);
    }
}
