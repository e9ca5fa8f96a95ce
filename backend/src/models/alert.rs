use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    #[serde(alias = "sos_alert")]
    Sos,
    LowFuel,
    Breakdown,
    NeedHelp,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Sos => "sos",
            AlertKind::LowFuel => "low_fuel",
            AlertKind::Breakdown => "breakdown",
            AlertKind::NeedHelp => "need_help",
        }
    }

    pub fn default_message(&self) -> &'static str {
        match self {
            AlertKind::Sos => "SOS! A rider needs immediate help",
            AlertKind::LowFuel => "A rider is running low on fuel",
            AlertKind::Breakdown => "A rider has a breakdown",
            AlertKind::NeedHelp => "A rider needs assistance",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AlertRequest {
    pub kind: AlertKind,
    #[validate(length(min = 1, max = 500))]
    pub message: Option<String>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,
}

impl AlertRequest {
    pub fn new(kind: AlertKind) -> Self {
        Self {
            kind,
            message: None,
            latitude: None,
            longitude: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_sos_name_is_accepted() {
        let kind: AlertKind = serde_json::from_str("\"sos_alert\"").unwrap();
        assert_eq!(kind, AlertKind::Sos);
        let kind: AlertKind = serde_json::from_str("\"low_fuel\"").unwrap();
        assert_eq!(kind, AlertKind::LowFuel);
        assert!(serde_json::from_str::<AlertKind>("\"flat_tyre\"").is_err());
    }
}
