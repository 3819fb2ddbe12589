use chrono::{DateTime, Utc};

/// Raw mono 16-bit little-endian PCM bytes.
pub type AudioChunk = Vec<u8>;

pub const BYTES_PER_SAMPLE: usize = 2;

/// Who is talking to the intent service, and in what audio format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub project_id: String,
    pub session_id: String,
    pub language_code: String,
    pub sample_rate: u32,
    /// Frames per captured chunk.
    pub chunk_size: usize,
}

impl SessionIdentity {
    /// Build an identity, generating a random session id when none is given.
    pub fn new(
        project_id: &str,
        session_id: Option<&str>,
        language_code: &str,
        sample_rate: u32,
        chunk_size: usize,
    ) -> Self {
        let session_id = match session_id {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => uuid::Uuid::new_v4().to_string(),
        };
        Self {
            project_id: project_id.to_string(),
            session_id,
            language_code: language_code.to_string(),
            sample_rate,
            chunk_size,
        }
    }

    pub fn session_path(&self) -> String {
        format!(
            "projects/{}/agent/sessions/{}",
            self.project_id, self.session_id
        )
    }

    pub fn audio_config(&self) -> InputAudioConfig {
        InputAudioConfig {
            encoding: AudioEncoding::Linear16,
            sample_rate_hertz: self.sample_rate,
            language_code: self.language_code.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioEncoding {
    Linear16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputAudioConfig {
    pub encoding: AudioEncoding,
    pub sample_rate_hertz: u32,
    pub language_code: String,
}

/// One message on the request half of a streaming exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamingRequest {
    /// Always the first message of an exchange.
    Config {
        session: String,
        audio_config: InputAudioConfig,
        single_utterance: bool,
    },
    Audio(AudioChunk),
}

impl StreamingRequest {
    pub fn is_config(&self) -> bool {
        matches!(self, StreamingRequest::Config { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionEvent {
    Transcript { text: String, is_final: bool },
    EndOfSingleUtterance,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Intent {
    pub display_name: String,
    pub confidence: f32,
}

/// The service's structured answer for an utterance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub query_text: String,
    pub language_code: String,
    pub intent: Intent,
    pub fulfillment_text: String,
}

impl QueryResult {
    pub fn has_intent(&self) -> bool {
        !self.intent.display_name.is_empty()
    }
}

/// One message on the response half of a streaming exchange.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamingResponse {
    pub recognition: Option<RecognitionEvent>,
    pub query_result: Option<QueryResult>,
}

impl StreamingResponse {
    pub fn transcript(text: &str, is_final: bool) -> Self {
        Self {
            recognition: Some(RecognitionEvent::Transcript {
                text: text.to_string(),
                is_final,
            }),
            query_result: None,
        }
    }

    pub fn end_of_utterance() -> Self {
        Self {
            recognition: Some(RecognitionEvent::EndOfSingleUtterance),
            query_result: None,
        }
    }

    pub fn query(result: QueryResult) -> Self {
        Self {
            recognition: None,
            query_result: Some(result),
        }
    }

    pub fn is_end_of_utterance(&self) -> bool {
        matches!(self.recognition, Some(RecognitionEvent::EndOfSingleUtterance))
    }

    /// The query result, if it names an intent.
    pub fn intent_result(&self) -> Option<&QueryResult> {
        self.query_result.as_ref().filter(|r| r.has_intent())
    }
}

/// A recognized utterance, handed to the game once per spoken command.
#[derive(Debug, Clone, PartialEq)]
pub struct UtteranceResult {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub raw_result: QueryResult,
}

impl UtteranceResult {
    pub fn intent_name(&self) -> &str {
        &self.raw_result.intent.display_name
    }

    pub fn transcript(&self) -> &str {
        &self.raw_result.query_text
    }
}
