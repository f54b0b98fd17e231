use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Driver {
    #[serde(default, deserialize_with = "super::lenient_i64")]
    pub driver_number: Option<i64>,
    pub full_name: Option<String>,
    pub last_name: Option<String>,
    pub team_name: Option<String>,
    pub team_colour: Option<String>,
    pub nationality: Option<String>,
    pub headshot_url: Option<String>,
}

impl Driver {
    /// Last name suitable for chart legends, ignoring blank values
    pub fn display_last_name(&self) -> Option<&str> {
        self.last_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Team colour as a CSS hex string. The API sends it without the `#`.
    pub fn team_colour_hex(&self) -> Option<String> {
        let colour = self.team_colour.as_deref()?.trim();
        if colour.is_empty() {
            return None;
        }
        if colour.starts_with('#') {
            Some(colour.to_string())
        } else {
            Some(format!("#{}", colour))
        }
    }
}
