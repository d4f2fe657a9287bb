// service/speech.rs
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;

const SPEECH_API: &str = "https://speech.googleapis.com/v1p1beta1/speech:recognize";

#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("Speech-to-text is not configured")]
    NotConfigured,

    #[error("Speech request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Speech API error: {0}")]
    Api(String),

    #[error("No speech was recognized")]
    EmptyTranscript,
}

/// Container format of the uploaded audio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AudioEncoding {
    /// Browser recordings.
    OggOpus,
    /// Twilio call recordings; the WAV header carries the sample rate.
    Wav,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerDetails {
    pub name: String,
    pub skills: Vec<String>,
    pub location: String,
    pub language: String,
}

#[derive(Debug, Deserialize)]
struct RecognizeResponse {
    #[serde(default)]
    results: Vec<RecognitionResult>,
}

#[derive(Debug, Deserialize)]
struct RecognitionResult {
    #[serde(default)]
    alternatives: Vec<Alternative>,
}

#[derive(Debug, Deserialize)]
struct Alternative {
    #[serde(default)]
    transcript: String,
}

#[derive(Debug, Clone)]
pub struct SpeechClient {
    http: reqwest::Client,
    api_key: Option<String>,
    access_token: Option<String>,
}

impl SpeechClient {
    pub fn new(config: &Config, http: reqwest::Client) -> Self {
        Self {
            http,
            api_key: config.google_speech_api_key.clone(),
            access_token: config.google_speech_access_token.clone(),
        }
    }

    pub async fn transcribe(
        &self,
        audio: &[u8],
        language_code: &str,
        encoding: AudioEncoding,
    ) -> Result<String, SpeechError> {
        let body = recognize_request(audio, language_code, encoding);

        let request = match (&self.api_key, &self.access_token) {
            (Some(key), _) => self.http.post(format!("{}?key={}", SPEECH_API, urlencoding::encode(key))),
            (None, Some(token)) => self.http.post(SPEECH_API).bearer_auth(token),
            (None, None) => return Err(SpeechError::NotConfigured),
        };

        let response = request
            .timeout(Duration::from_secs(15))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let body: serde_json::Value = response.json().await.unwrap_or_default();
            return Err(SpeechError::Api(
                body["error"]["message"].as_str().unwrap_or("recognition failed").to_string(),
            ));
        }

        let parsed: RecognizeResponse = response.json().await?;
        let transcript = join_transcripts(parsed);
        if transcript.trim().is_empty() {
            return Err(SpeechError::EmptyTranscript);
        }

        tracing::debug!("Transcribed {} bytes of {} audio", audio.len(), language_code);
        Ok(transcript)
    }
}

fn recognize_request(audio: &[u8], language_code: &str, encoding: AudioEncoding) -> serde_json::Value {
    let config = match encoding {
        AudioEncoding::OggOpus => serde_json::json!({
            "encoding": "OGG_OPUS",
            "sampleRateHertz": 16000,
            "languageCode": language_code,
            "enableAutomaticPunctuation": true,
        }),
        AudioEncoding::Wav => serde_json::json!({
            "languageCode": language_code,
            "enableAutomaticPunctuation": true,
        }),
    };

    serde_json::json!({
        "config": config,
        "audio": { "content": STANDARD.encode(audio) },
    })
}

fn join_transcripts(response: RecognizeResponse) -> String {
    response
        .results
        .into_iter()
        .filter_map(|r| r.alternatives.into_iter().next())
        .map(|a| a.transcript)
        .collect::<Vec<_>>()
        .join("")
}

const NAME_MARKER: &str = "नाम";

const SKILL_KEYWORDS: &[(&str, &str)] = &[
    ("मिस्त्री", "masonry"),
    ("बढ़ई", "carpentry"),
    ("प्लम्बर", "plumbing"),
];

/// Pulls a name and known skill keywords out of a Hindi transcript.
pub fn extract_worker_details(transcript: &str) -> WorkerDetails {
    let name = transcript
        .split_once(NAME_MARKER)
        .and_then(|(_, rest)| rest.split_whitespace().next())
        .unwrap_or_default()
        .to_string();

    let skills = SKILL_KEYWORDS
        .iter()
        .filter(|(hindi, _)| transcript.contains(hindi))
        .map(|(_, english)| english.to_string())
        .collect();

    WorkerDetails {
        name,
        skills,
        location: String::new(),
        language: "hi".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_name_and_skills() {
        let details = extract_worker_details("मेरा नाम रमेश है और मैं मिस्त्री और प्लम्बर हूँ");
        assert_eq!(details.name, "रमेश");
        assert_eq!(details.skills, vec!["masonry", "plumbing"]);
        assert_eq!(details.language, "hi");
    }

    #[test]
    fn test_extract_without_markers() {
        let details = extract_worker_details("Ramesh Kumar");
        assert!(details.name.is_empty());
        assert!(details.skills.is_empty());

        let trailing = extract_worker_details("मेरा नाम");
        assert!(trailing.name.is_empty());
    }

    #[test]
    fn test_join_transcripts_uses_first_alternative() {
        let response: RecognizeResponse = serde_json::from_value(serde_json::json!({
            "results": [
                { "alternatives": [{ "transcript": "मेरा नाम" }, { "transcript": "ignored" }] },
                { "alternatives": [{ "transcript": " सुरेश" }] },
                { "alternatives": [] }
            ]
        }))
        .unwrap();
        assert_eq!(join_transcripts(response), "मेरा नाम सुरेश");
    }

    #[test]
    fn test_recognize_request_config() {
        let request = recognize_request(b"abc", "hi-IN", AudioEncoding::OggOpus);
        assert_eq!(request["config"]["encoding"], "OGG_OPUS");
        assert_eq!(request["config"]["sampleRateHertz"], 16000);
        assert_eq!(request["audio"]["content"], "YWJj");

        let wav = recognize_request(b"abc", "en-IN", AudioEncoding::Wav);
        assert!(wav["config"].get("encoding").is_none());
        assert_eq!(wav["config"]["languageCode"], "en-IN");
    }

    #[tokio::test]
    async fn test_transcribe_requires_credentials() {
        let client = SpeechClient::new(&Config::test_config(), reqwest::Client::new());
        let result = client.transcribe(b"audio", "hi-IN", AudioEncoding::OggOpus).await;
        assert!(matches!(result, Err(SpeechError::NotConfigured)));
    }
}
