//! Printer status reports.

use serde::{Deserialize, Serialize};

/// Printer state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PrintState {
    /// Printer is idle.
    Idle,
    /// Print in progress.
    Printing,
    /// Print paused.
    Paused,
    /// Print finished.
    Finished,
    /// Error state.
    Error(String),
    /// Preparing to print.
    Preparing,
    /// Unknown state.
    #[default]
    Unknown,
}

impl PrintState {
    /// Parse from a Bambu `gcode_state` string.
    pub fn from_bambu_status(status: &str) -> Self {
        match status.to_lowercase().as_str() {
            "idle" | "standby" => Self::Idle,
            "printing" | "running" => Self::Printing,
            "paused" | "pause" => Self::Paused,
            "finished" | "finish" | "completed" => Self::Finished,
            "preparing" | "prepare" => Self::Preparing,
            s if s.contains("error") || s.contains("fail") => Self::Error(status.to_string()),
            _ => Self::Unknown,
        }
    }

    /// Whether the toolhead is free for manual commands.
    ///
    /// A finished or failed job leaves the printer as available as an idle one.
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle | Self::Finished | Self::Error(_))
    }
}

/// Latest known printer status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrinterStatus {
    /// Current print state.
    pub state: PrintState,
    /// Print progress (0-100).
    pub progress_percent: f64,
    /// Nozzle temperature (°C).
    pub nozzle_temp: f64,
    /// Target nozzle temperature.
    pub nozzle_target: f64,
    /// Bed temperature (°C).
    pub bed_temp: f64,
    /// Target bed temperature.
    pub bed_target: f64,
    /// Current print speed level.
    pub print_speed: u8,
    /// Current file name.
    pub filename: Option<String>,
}

impl PrinterStatus {
    /// Parse a full report.
    pub fn from_mqtt_payload(payload: &serde_json::Value) -> Self {
        let mut status = Self::default();
        status.apply(payload);
        status
    }

    /// Fold a report into this status.
    ///
    /// Printers push partial reports; fields absent from `payload` keep
    /// their previous value.
    pub fn apply(&mut self, payload: &serde_json::Value) {
        let Some(print) = payload.get("print") else {
            return;
        };

        if let Some(state) = print.get("gcode_state").and_then(|v| v.as_str()) {
            self.state = PrintState::from_bambu_status(state);
        }
        if let Some(pct) = print.get("mc_percent").and_then(|v| v.as_f64()) {
            self.progress_percent = pct;
        }
        if let Some(temp) = print.get("nozzle_temper").and_then(|v| v.as_f64()) {
            self.nozzle_temp = temp;
        }
        if let Some(target) = print.get("nozzle_target_temper").and_then(|v| v.as_f64()) {
            self.nozzle_target = target;
        }
        if let Some(temp) = print.get("bed_temper").and_then(|v| v.as_f64()) {
            self.bed_temp = temp;
        }
        if let Some(target) = print.get("bed_target_temper").and_then(|v| v.as_f64()) {
            self.bed_target = target;
        }
        if let Some(speed) = print.get("spd_lvl").and_then(|v| v.as_u64()) {
            self.print_speed = speed.min(u8::MAX as u64) as u8;
        }
        if let Some(name) = print.get("gcode_file").and_then(|v| v.as_str()) {
            self.filename = Some(name.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_state_parsing() {
        assert_eq!(PrintState::from_bambu_status("IDLE"), PrintState::Idle);
        assert_eq!(PrintState::from_bambu_status("RUNNING"), PrintState::Printing);
        assert_eq!(PrintState::from_bambu_status("PAUSE"), PrintState::Paused);
        assert_eq!(PrintState::from_bambu_status("SLICING"), PrintState::Unknown);
        assert!(matches!(
            PrintState::from_bambu_status("FAILED"),
            PrintState::Error(_)
        ));
    }

    #[test]
    fn test_idle_states() {
        assert!(PrintState::Idle.is_idle());
        assert!(PrintState::Finished.is_idle());
        assert!(!PrintState::Printing.is_idle());
        assert!(!PrintState::Unknown.is_idle());
    }

    #[test]
    fn test_partial_reports_merge() {
        let mut status = PrinterStatus::from_mqtt_payload(&json!({
            "print": {"gcode_state": "RUNNING", "nozzle_temper": 219.5, "spd_lvl": 2}
        }));
        assert_eq!(status.state, PrintState::Printing);

        status.apply(&json!({"print": {"bed_temper": 55.0}}));
        assert_eq!(status.state, PrintState::Printing);
        assert_eq!(status.nozzle_temp, 219.5);
        assert_eq!(status.bed_temp, 55.0);
        assert_eq!(status.print_speed, 2);

        status.apply(&json!({"system": {"led_mode": "on"}}));
        assert_eq!(status.bed_temp, 55.0);
    }
}
