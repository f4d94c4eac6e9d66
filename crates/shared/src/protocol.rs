use std::{fmt, num::NonZeroU32, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    domain::{Band, EventTopic, ScanDirection, StereoMode},
    error::ValidationError,
};

/// API namespace exposed by the radio binding.
pub const RADIO_API: &str = "radio";

/// API namespace a binder exposes verbs under, e.g. `radio`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ApiName(String);

impl ApiName {
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        check_segment("api", &name)?;
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ApiName {
    fn default() -> Self {
        Self(RADIO_API.to_string())
    }
}

impl fmt::Display for ApiName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ApiName {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::new(raw.trim())
    }
}

/// Address of a remote verb, rendered as `api/verb` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VerbPath {
    api: String,
    verb: String,
}

impl VerbPath {
    pub fn new(api: impl Into<String>, verb: impl Into<String>) -> Result<Self, ValidationError> {
        let api = api.into();
        let verb = verb.into();
        check_segment("api", &api)?;
        check_segment("verb", &verb)?;
        Ok(Self { api, verb })
    }

    pub fn api(&self) -> &str {
        &self.api
    }

    pub fn verb(&self) -> &str {
        &self.verb
    }
}

fn check_segment(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    if value.contains('/') || value.chars().any(char::is_whitespace) {
        return Err(ValidationError::IllegalCharacter {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

impl fmt::Display for VerbPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.api, self.verb)
    }
}

impl FromStr for VerbPath {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (api, verb) = raw
            .trim()
            .split_once('/')
            .ok_or_else(|| ValidationError::MalformedVerbPath(raw.to_string()))?;
        Self::new(api, verb)
    }
}

/// Every argument shape the radio binding accepts, one variant per verb usage.
///
/// Verbs that double as getter and setter (`band`, `frequency`, `stereo_mode`)
/// carry an `Option`: the binding treats a missing `value` key as a read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioRequest {
    Subscribe(EventTopic),
    Unsubscribe(EventTopic),
    Band(Option<Band>),
    BandSupported(Band),
    FrequencyRange(Band),
    FrequencyStep(Band),
    /// Tuning to 0 Hz is not a valid request.
    Frequency(Option<NonZeroU32>),
    Rds,
    Start,
    Stop,
    ScanStart(ScanDirection),
    ScanStop,
    StereoMode(Option<StereoMode>),
}

impl RadioRequest {
    pub fn verb(&self) -> &'static str {
        match self {
            RadioRequest::Subscribe(_) => "subscribe",
            RadioRequest::Unsubscribe(_) => "unsubscribe",
            RadioRequest::Band(_) => "band",
            RadioRequest::BandSupported(_) => "band_supported",
            RadioRequest::FrequencyRange(_) => "frequency_range",
            RadioRequest::FrequencyStep(_) => "frequency_step",
            RadioRequest::Frequency(_) => "frequency",
            RadioRequest::Rds => "rds",
            RadioRequest::Start => "start",
            RadioRequest::Stop => "stop",
            RadioRequest::ScanStart(_) => "scan_start",
            RadioRequest::ScanStop => "scan_stop",
            RadioRequest::StereoMode(_) => "stereo_mode",
        }
    }

    pub fn argument(&self) -> Value {
        match self {
            RadioRequest::Subscribe(topic) | RadioRequest::Unsubscribe(topic) => {
                json!({ "value": topic })
            }
            RadioRequest::Band(Some(band)) => json!({ "value": band }),
            RadioRequest::BandSupported(band)
            | RadioRequest::FrequencyRange(band)
            | RadioRequest::FrequencyStep(band) => json!({ "band": band }),
            RadioRequest::Frequency(Some(hz)) => json!({ "value": hz }),
            RadioRequest::ScanStart(direction) => json!({ "direction": direction }),
            RadioRequest::StereoMode(Some(mode)) => json!({ "value": mode }),
            RadioRequest::Band(None)
            | RadioRequest::Frequency(None)
            | RadioRequest::StereoMode(None)
            | RadioRequest::Rds
            | RadioRequest::Start
            | RadioRequest::Stop
            | RadioRequest::ScanStop => json!({}),
        }
    }

    /// Verb identifiers are fixed literals; only the namespace is user input.
    pub fn path(&self, api: &ApiName) -> VerbPath {
        VerbPath {
            api: api.as_str().to_string(),
            verb: self.verb().to_string(),
        }
    }
}

/// Outcome of one verb invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Reply {
    #[serde(rename = "ok")]
    Success(Value),
    #[serde(rename = "error")]
    Failure(Value),
}

impl Reply {
    pub fn is_success(&self) -> bool {
        matches!(self, Reply::Success(_))
    }

    pub fn payload(&self) -> &Value {
        match self {
            Reply::Success(payload) | Reply::Failure(payload) => payload,
        }
    }

    /// Label shown in front of the rendered payload.
    pub fn label(&self) -> &'static str {
        match self {
            Reply::Success(_) => "OK",
            Reply::Failure(_) => "ERROR",
        }
    }
}

/// Unsolicited notification pushed by the binder, e.g. `radio/frequency`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinderEvent {
    pub topic: String,
    #[serde(default)]
    pub payload: Value,
}

impl BinderEvent {
    pub fn new(topic: impl Into<String>, payload: Value) -> Self {
        Self {
            topic: topic.into(),
            payload,
        }
    }
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
