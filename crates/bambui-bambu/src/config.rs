//! Printer registry configuration.
//!
//! Printers are declared through environment variables of the form
//! `BAMBUI_PRINTER.<name>.<ATTRIBUTE>` where the attribute is one of
//! `IP`, `ACCESS_CODE`, `SERIAL` or `MODEL`.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Prefix of printer configuration variables.
pub const PRINTER_ENV_PREFIX: &str = "BAMBUI_PRINTER.";

/// Supported printer models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrinterModel {
    /// P1S.
    P1S,
    /// P1P.
    P1P,
    /// X1 Carbon.
    X1C,
    /// A1.
    A1,
}

impl PrinterModel {
    /// Model name as configured.
    pub fn as_str(self) -> &'static str {
        match self {
            PrinterModel::P1S => "P1S",
            PrinterModel::P1P => "P1P",
            PrinterModel::X1C => "X1C",
            PrinterModel::A1 => "A1",
        }
    }
}

impl fmt::Display for PrinterModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrinterModel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "P1S" => Ok(PrinterModel::P1S),
            "P1P" => Ok(PrinterModel::P1P),
            "X1C" => Ok(PrinterModel::X1C),
            "A1" => Ok(PrinterModel::A1),
            other => Err(ConfigError::UnknownModel(other.to_string())),
        }
    }
}

/// Bambu printer connection configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct BambuConfig {
    /// Registry name.
    pub name: String,
    /// Printer IP address.
    pub ip: IpAddr,
    /// Printer serial number.
    pub serial: String,
    /// Access code (from printer's LAN mode settings).
    pub access_code: String,
    /// Printer model.
    pub model: PrinterModel,
    /// Connection timeout.
    pub timeout: Duration,
}

impl BambuConfig {
    /// Create a new configuration.
    pub fn new(
        name: String,
        ip: IpAddr,
        serial: String,
        access_code: String,
        model: PrinterModel,
    ) -> Self {
        Self {
            name,
            ip,
            serial,
            access_code,
            model,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Collect printer configurations from `(key, value)` pairs.
///
/// Keys without the printer prefix are ignored; a printer with a missing
/// or malformed attribute fails the whole registry.
pub fn parse_printers<I, K, V>(vars: I) -> Result<BTreeMap<String, BambuConfig>, ConfigError>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
{
    let mut raw: BTreeMap<String, HashMap<&'static str, String>> = BTreeMap::new();
    for (key, value) in vars {
        let Some(rest) = key.as_ref().strip_prefix(PRINTER_ENV_PREFIX) else {
            continue;
        };
        let Some((name, attribute)) = rest.rsplit_once('.') else {
            continue;
        };
        let attribute = match attribute {
            "IP" => "IP",
            "ACCESS_CODE" => "ACCESS_CODE",
            "SERIAL" => "SERIAL",
            "MODEL" => "MODEL",
            _ => continue,
        };
        if name.is_empty() || name.contains('.') {
            continue;
        }
        raw.entry(name.to_string())
            .or_default()
            .insert(attribute, value.into());
    }

    raw.into_iter()
        .map(|(name, mut attrs)| -> Result<(String, BambuConfig), ConfigError> {
            let mut take = |attribute: &'static str| {
                attrs
                    .remove(attribute)
                    .ok_or_else(|| ConfigError::MissingAttribute {
                        printer: name.clone(),
                        attribute,
                    })
            };
            let ip = take("IP")?;
            let ip = ip
                .parse::<IpAddr>()
                .map_err(|_| ConfigError::InvalidIp(ip.clone()))?;
            let access_code = take("ACCESS_CODE")?;
            let serial = take("SERIAL")?;
            let model = take("MODEL")?.parse::<PrinterModel>()?;

            let config = BambuConfig::new(name.clone(), ip, serial, access_code, model);
            Ok((name, config))
        })
        .collect()
}

/// Printer configurations from the process environment.
pub fn printers_from_env() -> Result<BTreeMap<String, BambuConfig>, ConfigError> {
    parse_printers(std::env::vars())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_printers() {
        let printers = parse_printers(vars(&[
            ("BAMBUI_PRINTER.workshop.IP", "192.168.1.40"),
            ("BAMBUI_PRINTER.workshop.ACCESS_CODE", "12345678"),
            ("BAMBUI_PRINTER.workshop.SERIAL", "01P00A000000001"),
            ("BAMBUI_PRINTER.workshop.MODEL", "p1s"),
            ("HOME", "/root"),
            ("BAMBUI_PRINTER.workshop.COLOR", "black"),
        ]))
        .unwrap();

        assert_eq!(printers.len(), 1);
        let workshop = &printers["workshop"];
        assert_eq!(workshop.ip.to_string(), "192.168.1.40");
        assert_eq!(workshop.serial, "01P00A000000001");
        assert_eq!(workshop.model, PrinterModel::P1S);
    }

    #[test]
    fn test_missing_attribute() {
        let err = parse_printers(vars(&[
            ("BAMBUI_PRINTER.garage.IP", "10.0.0.2"),
            ("BAMBUI_PRINTER.garage.MODEL", "X1C"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingAttribute {
                attribute: "ACCESS_CODE",
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_values() {
        let mut pairs = vars(&[
            ("BAMBUI_PRINTER.a.IP", "not-an-ip"),
            ("BAMBUI_PRINTER.a.ACCESS_CODE", "x"),
            ("BAMBUI_PRINTER.a.SERIAL", "y"),
            ("BAMBUI_PRINTER.a.MODEL", "A1"),
        ]);
        assert!(matches!(
            parse_printers(pairs.clone()).unwrap_err(),
            ConfigError::InvalidIp(_)
        ));

        pairs[0].1 = "10.0.0.3".into();
        pairs[3].1 = "Ender3".into();
        assert!(matches!(
            parse_printers(pairs).unwrap_err(),
            ConfigError::UnknownModel(_)
        ));
    }

    #[test]
    fn test_empty_registry() {
        let printers = parse_printers(Vec::<(String, String)>::new()).unwrap();
        assert!(printers.is_empty());
    }
}
