use std::convert::Infallible;
use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};

/// Sensor identity as found in the scene attributes.
///
/// The three platforms that have dedicated coefficients get their own
/// variant; anything else is carried through verbatim so coefficient tables
/// can still be keyed on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Sensor {
    Landsat8Oli,
    Sentinel2aMsi,
    Sentinel2bMsi,
    Other(String),
}

impl Sensor {
    /// Platform prefix used to select the QAA water constants ("L8", "S2").
    pub fn platform(&self) -> &str {
        match self {
            Sensor::Landsat8Oli => "L8",
            Sensor::Sentinel2aMsi | Sensor::Sentinel2bMsi => "S2",
            Sensor::Other(name) => name.get(0..2).unwrap_or(name),
        }
    }

    pub fn is_sentinel2(&self) -> bool {
        matches!(self, Sensor::Sentinel2aMsi | Sensor::Sentinel2bMsi)
    }

    pub fn is_landsat8(&self) -> bool {
        matches!(self, Sensor::Landsat8Oli)
    }

    /// Sensors with water constants and band sets suited to the 4-band QAA.
    pub fn supports_qaa(&self) -> bool {
        self.is_landsat8() || self.is_sentinel2()
    }
}

impl FromStr for Sensor {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "L8_OLI" => Sensor::Landsat8Oli,
            "S2A_MSI" => Sensor::Sentinel2aMsi,
            "S2B_MSI" => Sensor::Sentinel2bMsi,
            other => Sensor::Other(other.to_string()),
        })
    }
}

impl<'de> Deserialize<'de> for Sensor {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        let Ok(sensor) = name.parse::<Sensor>();
        Ok(sensor)
    }
}

impl Display for Sensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sensor::Landsat8Oli => write!(f, "L8_OLI"),
            Sensor::Sentinel2aMsi => write!(f, "S2A_MSI"),
            Sensor::Sentinel2bMsi => write!(f, "S2B_MSI"),
            Sensor::Other(name) => write!(f, "{}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_names() {
        for name in ["L8_OLI", "S2A_MSI", "S2B_MSI", "PlanetScope"] {
            let sensor: Sensor = name.parse().unwrap();
            assert_eq!(sensor.to_string(), name);
        }
    }

    #[test]
    fn test_platform() {
        assert_eq!(Sensor::Landsat8Oli.platform(), "L8");
        assert_eq!(Sensor::Sentinel2bMsi.platform(), "S2");
        assert_eq!(Sensor::Other("L9_OLI".to_string()).platform(), "L9");
        assert!(!Sensor::Other("L9_OLI".to_string()).supports_qaa());
    }
}
