use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Declares a closed set of keywords understood by the radio binding.
///
/// Parsing is case-insensitive, rendering always uses the canonical spelling.
macro_rules! keyword_enum {
    ($name:ident, $invalid:ident, { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                let raw = raw.trim();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|candidate| candidate.as_str().eq_ignore_ascii_case(raw))
                    .ok_or_else(|| ValidationError::$invalid(raw.to_string()))
            }
        }
    };
}

keyword_enum!(Band, UnknownBand, {
    Am => "AM",
    Fm => "FM",
});

keyword_enum!(StereoMode, UnknownStereoMode, {
    Mono => "mono",
    Stereo => "stereo",
});

keyword_enum!(EventTopic, UnknownTopic, {
    Frequency => "frequency",
    StationFound => "station_found",
});

keyword_enum!(ScanDirection, UnknownScanDirection, {
    Forward => "forward",
    Backward => "backward",
});

impl EventTopic {
    /// Topics the console subscribes to as soon as the session opens.
    pub const DEFAULTS: [EventTopic; 2] = [EventTopic::Frequency, EventTopic::StationFound];
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
