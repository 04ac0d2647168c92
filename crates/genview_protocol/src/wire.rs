//! Request and response shapes of the `/api/generate` endpoint.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::event::StreamEvent;
use crate::message::Message;

/// Content type of the streamed generation response.
pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// Whether a request creates a component from scratch or repairs one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    Initial,
    Fix,
}

impl fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationMode::Initial => write!(f, "initial"),
            GenerationMode::Fix => write!(f, "fix"),
        }
    }
}

/// Body of a generation request.
///
/// The presence of `current_code` selects fix mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub prompt: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_code: Option<String>,
}

impl GenerateRequest {
    /// Build an initial-mode request.
    pub fn initial(prompt: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            prompt: prompt.into(),
            messages,
            current_code: None,
        }
    }

    /// Build a fix-mode request carrying the code to repair.
    pub fn fix(prompt: impl Into<String>, messages: Vec<Message>, current_code: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            messages,
            current_code: Some(current_code.into()),
        }
    }

    pub fn mode(&self) -> GenerationMode {
        if self.current_code.is_some() {
            GenerationMode::Fix
        } else {
            GenerationMode::Initial
        }
    }
}

/// One NDJSON line of the generation response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRecord {
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamChoice {
    #[serde(default)]
    pub text: String,
    #[serde(rename = "cleanedCode", default, skip_serializing_if = "Option::is_none")]
    pub cleaned_code: Option<String>,
}

impl StreamRecord {
    /// A record carrying one streamed text delta.
    pub fn fragment(text: impl Into<String>) -> Self {
        Self {
            choices: vec![StreamChoice {
                text: text.into(),
                cleaned_code: None,
            }],
        }
    }

    /// The terminal record carrying the cleaned artifact. Its `text` is always empty.
    pub fn cleaned(code: impl Into<String>) -> Self {
        Self {
            choices: vec![StreamChoice {
                text: String::new(),
                cleaned_code: Some(code.into()),
            }],
        }
    }

    /// Serialize as a newline-terminated NDJSON line.
    pub fn to_line(&self) -> serde_json::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    /// Interpret the record as a stream event.
    ///
    /// Records without choices or with an empty fragment carry nothing and
    /// yield `None`.
    pub fn into_event(self) -> Option<StreamEvent> {
        let choice = self.choices.into_iter().next()?;
        match choice.cleaned_code {
            Some(code) => Some(StreamEvent::FinalCleaned(code)),
            None if choice.text.is_empty() => None,
            None => Some(StreamEvent::Fragment(choice.text)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_request_omits_current_code() {
        let req = GenerateRequest::initial("build a counter", vec![Message::user("build a counter")]);
        assert_eq!(req.mode(), GenerationMode::Initial);

        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("currentCode").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_fix_request_uses_camel_case() {
        let req = GenerateRequest::fix("make it blue", vec![], "export default App;");
        assert_eq!(req.mode(), GenerationMode::Fix);

        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["currentCode"], "export default App;");
    }

    #[test]
    fn test_request_without_messages_parses() {
        let req: GenerateRequest = serde_json::from_str(r#"{"prompt":"x"}"#).unwrap();
        assert!(req.messages.is_empty());
        assert!(req.current_code.is_none());
    }

    #[test]
    fn test_cleaned_record_shape() {
        let line = StreamRecord::cleaned("import React").to_line().unwrap();
        assert_eq!(line, "{\"choices\":[{\"text\":\"\",\"cleanedCode\":\"import React\"}]}\n");
    }

    #[test]
    fn test_into_event() {
        assert_eq!(
            StreamRecord::fragment("abc").into_event(),
            Some(StreamEvent::Fragment("abc".to_string()))
        );
        assert_eq!(
            StreamRecord::cleaned("done").into_event(),
            Some(StreamEvent::FinalCleaned("done".to_string()))
        );
        assert_eq!(StreamRecord::fragment("").into_event(), None);
        assert_eq!(StreamRecord { choices: vec![] }.into_event(), None);
    }
}
