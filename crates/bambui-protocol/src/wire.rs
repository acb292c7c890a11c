//! Wire encoding.
//!
//! A wire message is a flat JSON object: the discriminant under `"type"`
//! and the variant's payload fields beside it, nothing else. Keys are
//! emitted in lexical order and without whitespace, so equal commands
//! always produce identical bytes.

use std::fmt;

use serde_json::{Map, Value};

use crate::catalog::Command;
use crate::error::DecodeError;
use crate::validate::{validate, Candidate, ValidCommand};

/// Name of the discriminant field.
pub const KIND_FIELD: &str = "type";

/// Encoded command, ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WireMessage(Vec<u8>);

impl WireMessage {
    /// Encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Encoded text. Wire messages are always UTF-8 JSON.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or_default()
    }

    /// Take the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl fmt::Display for WireMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encode a validated command.
pub fn encode(command: &ValidCommand) -> WireMessage {
    WireMessage(to_object(command.command()).to_string().into_bytes())
}

/// Decode and validate a wire message.
pub fn decode(bytes: &[u8]) -> Result<ValidCommand, DecodeError> {
    match serde_json::from_slice::<Value>(bytes)? {
        Value::Object(object) => Ok(validate(&Candidate::from_object(object))?),
        _ => Err(DecodeError::NotAnObject),
    }
}

fn to_object(command: &Command) -> Value {
    // serde_json's default map is ordered by key, which gives the canonical layout.
    let mut object = Map::new();
    object.insert(KIND_FIELD.into(), command.kind().as_str().into());

    match command {
        Command::ChamberLight { enable } => {
            object.insert("enable".into(), (*enable).into());
        }
        Command::ExtruderTemp { temperature } | Command::BedTemp { temperature } => {
            object.insert("temperature".into(), (*temperature).into());
        }
        Command::PrintSpeed { speed } => {
            object.insert("speed".into(), speed.level().into());
        }
        Command::FanAux { speed } | Command::FanChamber { speed } | Command::FanPart { speed } => {
            object.insert("speed".into(), (*speed).into());
        }
        Command::MoveX { distance }
        | Command::MoveY { distance }
        | Command::MoveZ { distance }
        | Command::MoveE { distance } => {
            object.insert("distance".into(), (*distance).into());
        }
        Command::Calibrate {
            bed_levelling,
            motor_noise_cancellation,
            vibration_compensation,
        } => {
            object.insert("bed_levelling".into(), (*bed_levelling).into());
            object.insert(
                "motor_noise_cancellation".into(),
                (*motor_noise_cancellation).into(),
            );
            object.insert(
                "vibration_compensation".into(),
                (*vibration_compensation).into(),
            );
        }
        Command::UploadFile { file, file_name } => {
            object.insert("file".into(), file.as_str().into());
            object.insert("file_name".into(), file_name.as_str().into());
        }
        Command::MoveHome
        | Command::StopPrint
        | Command::PausePrint
        | Command::ResumePrint
        | Command::LoadFilament
        | Command::UnloadFilament
        | Command::ForceRefresh => {}
    }

    Value::Object(object)
}
