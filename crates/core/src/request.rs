//! Request Model
//!
//! One JSON object per input line. Every field is optional on the wire; the
//! accessors apply the defaults each feature expects.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use std::fmt;

pub const DEFAULT_LANGUAGE: &str = "English";
pub const DEFAULT_REQUEST_ID: &str = "unknown";
pub const DEFAULT_SUMMARY_LEVEL: &str = "simple";
pub const DEFAULT_CATEGORY: &str = "General Knowledge";
pub const DEFAULT_QUESTION_COUNT: u32 = 5;
pub const DEFAULT_QUESTION_TYPE: &str = "multiple-choice";

const LANGUAGE_CODES: &[(&str, &str)] = &[
    ("en", "English"),
    ("hi", "Hindi"),
    ("bn", "Bengali"),
    ("ta", "Tamil"),
    ("te", "Telugu"),
    ("mr", "Marathi"),
    ("gu", "Gujarati"),
];

/// Recorded audio, either already encoded by the client or as raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum AudioData {
    Encoded(String),
    Bytes(Vec<u8>),
}

impl AudioData {
    pub fn is_empty(&self) -> bool {
        match self {
            AudioData::Encoded(text) => text.is_empty(),
            AudioData::Bytes(bytes) => bytes.is_empty(),
        }
    }

    /// The form handed to the transcription tool. Raw bytes are base64-encoded.
    pub fn to_query(&self) -> String {
        match self {
            AudioData::Encoded(text) => text.clone(),
            AudioData::Bytes(bytes) => STANDARD.encode(bytes),
        }
    }
}

/// The response-handling branch a request is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    Text,
    Summary,
    Quiz,
    Translation,
    Image,
    Interview,
}

impl Feature {
    /// Parses a declared feature name. Unknown names route as [`Feature::Text`].
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "summary" => Feature::Summary,
            "quiz" => Feature::Quiz,
            "translation" => Feature::Translation,
            "image" => Feature::Image,
            "interview" => Feature::Interview,
            _ => Feature::Text,
        }
    }

    /// Whether the branch answers with a JSON object rather than plain text.
    pub fn is_structured(self) -> bool {
        matches!(self, Feature::Summary | Feature::Quiz | Feature::Interview)
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Feature::Text => "text",
            Feature::Summary => "summary",
            Feature::Quiz => "quiz",
            Feature::Translation => "translation",
            Feature::Image => "image",
            Feature::Interview => "interview",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default, alias = "request_id")]
    pub request_id: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default, alias = "is_voice_input")]
    pub is_voice_input: Option<bool>,
    #[serde(default, alias = "audio_data")]
    pub audio_data: Option<AudioData>,
    #[serde(default)]
    pub feature: Option<String>,
    #[serde(default, alias = "summary_level")]
    pub summary_level: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, alias = "question_count")]
    pub question_count: Option<u32>,
    #[serde(default, alias = "question_type")]
    pub question_type: Option<String>,
    #[serde(default, alias = "job_details")]
    pub job_details: Option<String>,
    #[serde(default, alias = "company_info")]
    pub company_info: Option<String>,
}

impl Request {
    pub fn prompt(&self) -> &str {
        self.prompt.as_deref().unwrap_or_default()
    }

    pub fn request_id(&self) -> &str {
        self.request_id.as_deref().unwrap_or(DEFAULT_REQUEST_ID)
    }

    /// The full language name, with short codes expanded.
    pub fn language(&self) -> String {
        resolve_language(self.language.as_deref().unwrap_or_default())
    }

    pub fn is_voice_input(&self) -> bool {
        self.is_voice_input.unwrap_or(false)
    }

    /// Audio to transcribe, present only for voice input with a non-empty payload.
    pub fn voice_audio(&self) -> Option<&AudioData> {
        if !self.is_voice_input() {
            return None;
        }
        self.audio_data.as_ref().filter(|audio| !audio.is_empty())
    }

    /// The declared feature, if the request names one.
    pub fn declared_feature(&self) -> Option<Feature> {
        self.feature
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .map(Feature::parse)
    }

    pub fn summary_level(&self) -> &str {
        non_empty(self.summary_level.as_deref()).unwrap_or(DEFAULT_SUMMARY_LEVEL)
    }

    pub fn category(&self) -> &str {
        non_empty(self.category.as_deref()).unwrap_or(DEFAULT_CATEGORY)
    }

    pub fn question_count(&self) -> u32 {
        self.question_count.unwrap_or(DEFAULT_QUESTION_COUNT)
    }

    pub fn question_type(&self) -> &str {
        non_empty(self.question_type.as_deref()).unwrap_or(DEFAULT_QUESTION_TYPE)
    }

    pub fn job_details(&self) -> &str {
        self.job_details.as_deref().unwrap_or_default()
    }

    pub fn company_info(&self) -> &str {
        self.company_info.as_deref().unwrap_or_default()
    }

    /// True when there is nothing to work on: no prompt, no audio and, for
    /// interview requests, no job details either.
    pub fn is_empty(&self) -> bool {
        let has_audio = self
            .audio_data
            .as_ref()
            .is_some_and(|audio| !audio.is_empty());
        let has_job = !self.job_details().trim().is_empty();
        self.prompt().is_empty() && !has_audio && !has_job
    }
}

/// Expands a short language code to its name. Other values pass through;
/// an empty value means English.
pub fn resolve_language(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return DEFAULT_LANGUAGE.to_string();
    }
    LANGUAGE_CODES
        .iter()
        .find(|(code, _)| code.eq_ignore_ascii_case(trimmed))
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
