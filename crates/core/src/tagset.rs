//! Supported positional tagsets.
//!
//! A tagset determines how a part-of-speech value is derived from the
//! positional tag column when generating n-gram frequency data.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A positional tagset the service knows how to interpret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupportedTagset {
    #[serde(rename = "cs_cnc2000")]
    CsCnc2000,
    #[serde(rename = "cs_cnc2000_spk")]
    CsCnc2000Spk,
    #[serde(rename = "cs_cnc2020")]
    CsCnc2020,
    #[serde(rename = "ud")]
    Ud,
}

impl SupportedTagset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CsCnc2000 => "cs_cnc2000",
            Self::CsCnc2000Spk => "cs_cnc2000_spk",
            Self::CsCnc2020 => "cs_cnc2020",
            Self::Ud => "ud",
        }
    }

    /// Parse a tagset identifier as stored in corpus metadata.
    pub fn from_id(value: &str) -> Result<Self, CoreError> {
        match value {
            "cs_cnc2000" => Ok(Self::CsCnc2000),
            "cs_cnc2000_spk" => Ok(Self::CsCnc2000Spk),
            "cs_cnc2020" => Ok(Self::CsCnc2020),
            "ud" => Ok(Self::Ud),
            other => Err(CoreError::Validation(format!(
                "unsupported tagset \"{other}\""
            ))),
        }
    }

    /// Extract a part-of-speech value from a raw positional tag.
    ///
    /// For the CNC tagsets the PoS is the first tag character; for UD the
    /// tag value already is the (universal) PoS.
    pub fn pos_of_tag<'a>(&self, tag: &'a str) -> &'a str {
        match self {
            Self::CsCnc2000 | Self::CsCnc2000Spk | Self::CsCnc2020 => {
                tag.get(0..1).unwrap_or("")
            }
            Self::Ud => tag,
        }
    }
}

impl std::fmt::Display for SupportedTagset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pick the first tagset from corpus metadata the service supports.
pub fn first_supported(candidates: &[String]) -> Option<SupportedTagset> {
    candidates
        .iter()
        .find_map(|c| SupportedTagset::from_id(c).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_id_accepts_known_tagsets() {
        assert_eq!(
            SupportedTagset::from_id("cs_cnc2020").unwrap(),
            SupportedTagset::CsCnc2020
        );
    }

    #[test]
    fn from_id_rejects_unknown() {
        assert!(SupportedTagset::from_id("ptb").is_err());
    }

    #[test]
    fn cnc_pos_is_first_tag_char() {
        assert_eq!(SupportedTagset::CsCnc2020.pos_of_tag("NNMS1-----A----"), "N");
    }

    #[test]
    fn ud_pos_is_whole_tag() {
        assert_eq!(SupportedTagset::Ud.pos_of_tag("NOUN"), "NOUN");
    }

    #[test]
    fn first_supported_skips_unknown_entries() {
        let candidates = vec!["ptb".to_string(), "ud".to_string()];
        assert_eq!(first_supported(&candidates), Some(SupportedTagset::Ud));
    }

    #[test]
    fn first_supported_empty_when_nothing_matches() {
        assert_eq!(first_supported(&["ptb".to_string()]), None);
    }
}
