use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::llm::OpenAiClient;

/// Voice calls give up after this long, matching the dashboard's voice widgets.
pub const VOICE_TIMEOUT: Duration = Duration::from_secs(30);

const TRANSCRIPTION_MODEL: &str = "whisper-1";
const SPEECH_MODEL: &str = "tts-1";
const SPEECH_VOICE: &str = "alloy";

/// A recorded clip uploaded from the browser.
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub content_type: String,
}

#[async_trait]
pub trait SpeechService: Send + Sync {
    async fn transcribe(&self, clip: AudioClip) -> Result<String>;

    /// MP3 audio of `text` read aloud.
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

#[derive(Deserialize)]
struct Transcription {
    text: String,
}

#[async_trait]
impl SpeechService for OpenAiClient {
    async fn transcribe(&self, clip: AudioClip) -> Result<String> {
        let part = Part::bytes(clip.bytes)
            .file_name(clip.file_name)
            .mime_str(&clip.content_type)
            .context("Invalid audio content type")?;
        let form = Form::new()
            .text("model", TRANSCRIPTION_MODEL)
            .part("file", part);

        let response = self
            .http
            .post(self.endpoint("audio/transcriptions"))
            .bearer_auth(&self.api_key)
            .timeout(VOICE_TIMEOUT)
            .multipart(form)
            .send()
            .await
            .context("Transcription request failed")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Transcription API returned {status}: {text}"));
        }

        let transcription: Transcription = response
            .json()
            .await
            .context("Failed to decode transcription")?;
        Ok(transcription.text.trim().to_string())
    }

    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let response = self
            .http
            .post(self.endpoint("audio/speech"))
            .bearer_auth(&self.api_key)
            .timeout(VOICE_TIMEOUT)
            .json(&json!({
                "model": SPEECH_MODEL,
                "voice": SPEECH_VOICE,
                "input": text,
                "response_format": "mp3",
            }))
            .send()
            .await
            .context("Speech request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Speech API returned {status}: {body}"));
        }

        let audio = response.bytes().await.context("Failed to read speech audio")?;
        Ok(audio.to_vec())
    }
}
