//! Command validation.
//!
//! A [`Candidate`] is whatever arrived from a user or the wire: a kind name
//! and a bag of JSON fields. [`validate`] checks it against the catalog and
//! yields a [`ValidCommand`], the only form the encoder accepts. Checking
//! stops at the first violation.

use serde_json::{Map, Value};

use crate::catalog::{Command, CommandKind, Constraint, FieldShape, SpeedLevel};
use crate::error::{Result, ValidationError};
use crate::wire::KIND_FIELD;

/// An unchecked command.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Candidate {
    /// Kind name as given.
    pub kind: Option<String>,
    /// Payload fields as given.
    pub fields: Map<String, Value>,
}

impl Candidate {
    /// Candidate with a kind and no fields.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            fields: Map::new(),
        }
    }

    /// Add a payload field.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Split a flat JSON object into discriminant and payload.
    ///
    /// A non-string discriminant is kept as its JSON text so that it fails
    /// as an unknown kind.
    pub fn from_object(mut object: Map<String, Value>) -> Self {
        let kind = object.remove(KIND_FIELD).map(|value| match value {
            Value::String(kind) => kind,
            other => other.to_string(),
        });
        Self {
            kind,
            fields: object,
        }
    }
}

/// A command known to satisfy the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidCommand(Command);

impl ValidCommand {
    /// The checked command.
    pub fn command(&self) -> &Command {
        &self.0
    }

    /// Discriminant of the command.
    pub fn kind(&self) -> CommandKind {
        self.0.kind()
    }

    /// Unwrap into the plain command.
    pub fn into_inner(self) -> Command {
        self.0
    }
}

impl TryFrom<Command> for ValidCommand {
    type Error = ValidationError;

    fn try_from(command: Command) -> Result<Self> {
        check_domains(&command)?;
        Ok(Self(command))
    }
}

impl AsRef<Command> for ValidCommand {
    fn as_ref(&self) -> &Command {
        &self.0
    }
}

/// Check a candidate against the catalog.
pub fn validate(candidate: &Candidate) -> Result<ValidCommand> {
    let kind: CommandKind = candidate
        .kind
        .as_deref()
        .ok_or(ValidationError::MissingKind)?
        .parse()?;

    // Map iterates in key order, so the reported extra field is stable.
    if let Some(extra) = candidate
        .fields
        .keys()
        .find(|name| kind.field(name).is_none())
    {
        return Err(ValidationError::UnexpectedField {
            kind,
            field: extra.clone(),
        });
    }
    if let Some(missing) = kind
        .fields()
        .iter()
        .find(|spec| !candidate.fields.contains_key(spec.name))
    {
        return Err(ValidationError::MissingField {
            kind,
            field: missing.name.to_string(),
        });
    }

    let fields = Fields {
        kind,
        values: &candidate.fields,
    };
    let command = match kind {
        CommandKind::ChamberLight => Command::ChamberLight {
            enable: fields.flag("enable")?,
        },
        CommandKind::ExtruderTemp => Command::ExtruderTemp {
            temperature: fields.number("temperature")?,
        },
        CommandKind::BedTemp => Command::BedTemp {
            temperature: fields.number("temperature")?,
        },
        CommandKind::PrintSpeed => Command::PrintSpeed {
            speed: fields.speed_level("speed")?,
        },
        CommandKind::FanAux => Command::FanAux {
            speed: fields.number("speed")?,
        },
        CommandKind::FanChamber => Command::FanChamber {
            speed: fields.number("speed")?,
        },
        CommandKind::FanPart => Command::FanPart {
            speed: fields.number("speed")?,
        },
        CommandKind::MoveX => Command::MoveX {
            distance: fields.number("distance")?,
        },
        CommandKind::MoveY => Command::MoveY {
            distance: fields.number("distance")?,
        },
        CommandKind::MoveZ => Command::MoveZ {
            distance: fields.number("distance")?,
        },
        CommandKind::MoveE => Command::MoveE {
            distance: fields.number("distance")?,
        },
        CommandKind::MoveHome => Command::MoveHome,
        CommandKind::StopPrint => Command::StopPrint,
        CommandKind::PausePrint => Command::PausePrint,
        CommandKind::ResumePrint => Command::ResumePrint,
        CommandKind::LoadFilament => Command::LoadFilament,
        CommandKind::UnloadFilament => Command::UnloadFilament,
        CommandKind::ForceRefresh => Command::ForceRefresh,
        CommandKind::Calibrate => Command::Calibrate {
            bed_levelling: fields.flag("bed_levelling")?,
            motor_noise_cancellation: fields.flag("motor_noise_cancellation")?,
            vibration_compensation: fields.flag("vibration_compensation")?,
        },
        CommandKind::UploadFile => Command::UploadFile {
            file: fields.text("file")?,
            file_name: fields.text("file_name")?,
        },
    };

    ValidCommand::try_from(command)
}

/// Typed access to the payload of a candidate whose field set already matches.
struct Fields<'a> {
    kind: CommandKind,
    values: &'a Map<String, Value>,
}

impl Fields<'_> {
    fn get(&self, name: &str) -> Result<&Value> {
        self.values
            .get(name)
            .ok_or_else(|| ValidationError::MissingField {
                kind: self.kind,
                field: name.to_string(),
            })
    }

    fn wrong_type(&self, name: &str) -> ValidationError {
        let expected = self
            .kind
            .field(name)
            .map(|spec| spec.shape.expected())
            .unwrap_or("value");
        ValidationError::WrongType {
            field: name.to_string(),
            expected,
        }
    }

    fn flag(&self, name: &str) -> Result<bool> {
        self.get(name)?
            .as_bool()
            .ok_or_else(|| self.wrong_type(name))
    }

    fn number(&self, name: &str) -> Result<f64> {
        self.get(name)?
            .as_f64()
            .ok_or_else(|| self.wrong_type(name))
    }

    fn text(&self, name: &str) -> Result<String> {
        self.get(name)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| self.wrong_type(name))
    }

    fn speed_level(&self, name: &str) -> Result<SpeedLevel> {
        let value = self.get(name)?;
        if !value.is_number() {
            return Err(self.wrong_type(name));
        }
        // 2.5, 2.0 and 9e99 all land here as non-integers.
        let level = value.as_i64().ok_or_else(|| ValidationError::OutOfDomain {
            field: name.to_string(),
            constraint: Constraint::SpeedLevel,
        })?;
        SpeedLevel::try_from(level)
    }
}

fn check_domains(command: &Command) -> Result<()> {
    match command {
        Command::ExtruderTemp { temperature } | Command::BedTemp { temperature } => {
            check_number(FieldShape::Temperature, "temperature", *temperature)
        }
        Command::FanAux { speed } | Command::FanChamber { speed } | Command::FanPart { speed } => {
            check_number(FieldShape::Percentage, "speed", *speed)
        }
        Command::MoveX { distance }
        | Command::MoveY { distance }
        | Command::MoveZ { distance }
        | Command::MoveE { distance } => check_number(FieldShape::Distance, "distance", *distance),
        Command::UploadFile { file_name, .. } if file_name.is_empty() => {
            Err(ValidationError::OutOfDomain {
                field: "file_name".into(),
                constraint: Constraint::NonEmpty,
            })
        }
        Command::ChamberLight { .. }
        | Command::PrintSpeed { .. }
        | Command::MoveHome
        | Command::StopPrint
        | Command::PausePrint
        | Command::ResumePrint
        | Command::LoadFilament
        | Command::UnloadFilament
        | Command::ForceRefresh
        | Command::Calibrate { .. }
        | Command::UploadFile { .. } => Ok(()),
    }
}

fn check_number(shape: FieldShape, field: &str, value: f64) -> Result<()> {
    let violated = if !value.is_finite() {
        Some(Constraint::Finite)
    } else {
        match shape {
            FieldShape::Temperature if value < 0.0 => Some(Constraint::NonNegative),
            FieldShape::Percentage if !(0.0..=100.0).contains(&value) => {
                Some(Constraint::Percentage)
            }
            _ => None,
        }
    };

    match violated {
        Some(constraint) => Err(ValidationError::OutOfDomain {
            field: field.to_string(),
            constraint,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn out_of_domain(field: &str, constraint: Constraint) -> ValidationError {
        ValidationError::OutOfDomain {
            field: field.into(),
            constraint,
        }
    }

    #[test]
    fn test_print_speed_levels() {
        for level in 1..=4 {
            let candidate = Candidate::new("print_speed").with("speed", level);
            assert!(validate(&candidate).is_ok(), "level {level}");
        }
        for bad in [json!(0), json!(5), json!(2.5), json!(-1)] {
            let candidate = Candidate::new("print_speed").with("speed", bad.clone());
            assert_eq!(
                validate(&candidate).unwrap_err(),
                out_of_domain("speed", Constraint::SpeedLevel),
                "speed {bad}"
            );
        }
    }

    #[test]
    fn test_print_speed_wrong_type() {
        let candidate = Candidate::new("print_speed").with("speed", "2");
        assert_eq!(
            validate(&candidate).unwrap_err(),
            ValidationError::WrongType {
                field: "speed".into(),
                expected: "integer"
            }
        );
    }

    #[test]
    fn test_fan_speed_range() {
        for kind in ["fan_aux", "fan_chamber", "fan_part"] {
            for ok in [0.0, 42.5, 100.0] {
                let candidate = Candidate::new(kind).with("speed", ok);
                assert!(validate(&candidate).is_ok(), "{kind} {ok}");
            }
            for bad in [-0.1, 100.5, -50.0] {
                let candidate = Candidate::new(kind).with("speed", bad);
                assert_eq!(
                    validate(&candidate).unwrap_err(),
                    out_of_domain("speed", Constraint::Percentage)
                );
            }
        }
    }

    #[test]
    fn test_temperature_rejects_negative() {
        for kind in ["extruder_temp", "bed_temp"] {
            let candidate = Candidate::new(kind).with("temperature", -1);
            assert_eq!(
                validate(&candidate).unwrap_err(),
                out_of_domain("temperature", Constraint::NonNegative)
            );
            // No upper bound is imposed.
            let hot = Candidate::new(kind).with("temperature", 900);
            assert!(validate(&hot).is_ok());
        }
    }

    #[test]
    fn test_move_accepts_signed_distance() {
        let candidate = Candidate::new("move_z").with("distance", -10.5);
        assert_eq!(
            validate(&candidate).unwrap().command(),
            &Command::MoveZ { distance: -10.5 }
        );
    }

    #[test]
    fn test_typed_command_domains() {
        let err = ValidCommand::try_from(Command::MoveX {
            distance: f64::NAN,
        })
        .unwrap_err();
        assert_eq!(err, out_of_domain("distance", Constraint::Finite));

        let err = ValidCommand::try_from(Command::BedTemp {
            temperature: f64::INFINITY,
        })
        .unwrap_err();
        assert_eq!(err, out_of_domain("temperature", Constraint::Finite));

        assert!(ValidCommand::try_from(Command::FanPart { speed: 100.0 }).is_ok());
    }

    #[test]
    fn test_upload_file_name() {
        let empty = Candidate::new("upload_file")
            .with("file", "AAAA")
            .with("file_name", "");
        assert_eq!(
            validate(&empty).unwrap_err(),
            out_of_domain("file_name", Constraint::NonEmpty)
        );

        let named = Candidate::new("upload_file")
            .with("file", "AAAA")
            .with("file_name", "cube.3mf");
        assert_eq!(named.fields.len(), 2);
        assert!(validate(&named).is_ok());
    }

    #[test]
    fn test_unknown_and_missing_kind() {
        assert_eq!(
            validate(&Candidate::new("fan_speed")).unwrap_err(),
            ValidationError::UnknownKind("fan_speed".into())
        );
        assert_eq!(
            validate(&Candidate::default()).unwrap_err(),
            ValidationError::MissingKind
        );
    }

    #[test]
    fn test_field_set_must_match() {
        let extra = Candidate::new("move_home").with("distance", 1);
        let err = validate(&extra).unwrap_err();
        assert_eq!(err.field(), Some("distance"));
        assert!(matches!(err, ValidationError::UnexpectedField { .. }));

        let missing = Candidate::new("calibrate")
            .with("bed_levelling", true)
            .with("vibration_compensation", false);
        assert_eq!(
            validate(&missing).unwrap_err(),
            ValidationError::MissingField {
                kind: CommandKind::Calibrate,
                field: "motor_noise_cancellation".into(),
            }
        );
    }

    #[test]
    fn test_fail_fast_reports_first_violation() {
        // Both an extra field and a bad value: the field set is checked first.
        let candidate = Candidate::new("fan_part")
            .with("speed", 250)
            .with("colour", "red");
        let err = validate(&candidate).unwrap_err();
        assert_eq!(err.field(), Some("colour"));
    }

    #[test]
    fn test_wrong_type() {
        let candidate = Candidate::new("chamber_light").with("enable", "yes");
        assert_eq!(
            validate(&candidate).unwrap_err(),
            ValidationError::WrongType {
                field: "enable".into(),
                expected: "boolean"
            }
        );
    }

    #[test]
    fn test_from_object_non_string_kind() {
        let object = json!({"type": 7}).as_object().cloned().unwrap();
        let candidate = Candidate::from_object(object);
        assert_eq!(
            validate(&candidate).unwrap_err(),
            ValidationError::UnknownKind("7".into())
        );
    }
}
