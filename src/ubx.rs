use std::path::Path;

use ini::Ini;

use crate::{
    error::{Error, Result},
    message::{ConfigValuesSet, parse_int},
};

const BAUD_RATE_ITEM: &str = "CFG-UART1-BAUDRATE";

/// Receiver configuration, as read from one section of an INI file
/// (one section per communication type: `USB`, `UART`..)
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub section: String,
    /// Configuration item name and value, in file order
    pub items: Vec<(String, String)>,
}

/// Inline `#` / `;` comments are not part of the value
fn strip_comment(value: &str) -> &str {
    value
        .split(['#', ';'])
        .next()
        .unwrap_or_default()
        .trim()
}

impl Settings {
    pub fn from_file<P: AsRef<Path>>(path: P, section: &str) -> Result<Self> {
        let ini = Ini::load_from_file(path)?;
        Self::from_ini(&ini, section)
    }

    pub fn from_ini_str(content: &str, section: &str) -> Result<Self> {
        let ini = Ini::load_from_str(content).map_err(ini::Error::Parse)?;
        Self::from_ini(&ini, section)
    }

    fn from_ini(ini: &Ini, section: &str) -> Result<Self> {
        let properties = ini
            .section(Some(section))
            .ok_or_else(|| Error::MissingSection(section.to_string()))?;

        let items = properties
            .iter()
            .map(|(name, value)| (name.trim().to_string(), strip_comment(value).to_string()))
            .collect();

        Ok(Self {
            section: section.to_string(),
            items,
        })
    }

    /// CFG-VALSET applying every item of this section.
    pub fn to_cfg_valset(&self) -> Result<ConfigValuesSet> {
        ConfigValuesSet::new(
            self.items
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_str())),
        )
    }

    /// UART1 baud rate the receiver will switch to, if configured.
    pub fn baud_rate(&self) -> Result<Option<u32>> {
        let Some((name, value)) = self
            .items
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(BAUD_RATE_ITEM))
        else {
            return Ok(None);
        };

        parse_int(value)
            .and_then(|baud| u32::try_from(baud).ok())
            .map(Some)
            .ok_or_else(|| Error::InvalidConfigValue {
                name: name.clone(),
                value: value.clone(),
            })
    }
}
