//! Synthesis collaborator bridge. Voice is an enhancement: any failure is
//! logged and the turn proceeds without audio.
//!
//! The service answers `POST /synthesize` with `{status, filename, path}`
//! and serves the file itself at `GET /audio/{filename}`; the bridge turns
//! that into a fetchable URL for the client.

use serde::{Deserialize, Serialize};
use std::time::Duration;

const SYNTHESIS_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    speaker_id: &'a str,
}

#[derive(Deserialize)]
struct SynthesisResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    filename: Option<String>,
}

pub struct VoiceBridge {
    base_url: String,
    client: reqwest::Client,
}

impl VoiceBridge {
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(SYNTHESIS_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Requests synthesis for a reply. `None` on any failure.
    pub async fn synthesize(&self, text: &str, speaker_id: &str) -> Option<String> {
        let url = format!("{}/synthesize", self.base_url);
        let body = SynthesisRequest { text, speaker_id };

        let res = match self.client.post(&url).json(&body).send().await {
            Ok(res) => res,
            Err(e) => {
                tracing::warn!(target: "botan::voice", error = %e, "synthesis request failed");
                return None;
            }
        };

        if !res.status().is_success() {
            tracing::warn!(target: "botan::voice", status = %res.status(), "synthesis service error");
            return None;
        }

        match res.json::<SynthesisResponse>().await {
            Ok(parsed) => self.audio_url_from(parsed),
            Err(e) => {
                tracing::warn!(target: "botan::voice", error = %e, "synthesis response parse failed");
                None
            }
        }
    }

    /// The service returns only the filename; the fetchable URL points back
    /// at its own `/audio/{filename}` route.
    fn audio_url_from(&self, response: SynthesisResponse) -> Option<String> {
        if response.status != "success" {
            tracing::warn!(target: "botan::voice", status = %response.status, "synthesis reported failure");
            return None;
        }
        match response.filename {
            Some(filename) if !filename.is_empty() => {
                Some(format!("{}/audio/{}", self.base_url, filename))
            }
            _ => {
                tracing::warn!(target: "botan::voice", "synthesis succeeded without a filename");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bridge() -> VoiceBridge {
        VoiceBridge::new("http://localhost:8002/")
    }

    #[test]
    fn test_successful_synthesis_yields_audio_url() {
        let raw = r#"{"status": "success", "filename": "botan_123.mp3", "path": "/tmp/out/botan_123.mp3"}"#;
        let parsed: SynthesisResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(
            bridge().audio_url_from(parsed).as_deref(),
            Some("http://localhost:8002/audio/botan_123.mp3")
        );
    }

    #[test]
    fn test_failure_status_yields_no_audio() {
        let raw = r#"{"status": "error", "filename": "botan_123.mp3"}"#;
        let parsed: SynthesisResponse = serde_json::from_str(raw).unwrap();
        assert!(bridge().audio_url_from(parsed).is_none());
    }

    #[test]
    fn test_missing_filename_yields_no_audio() {
        let raw = r#"{"status": "success"}"#;
        let parsed: SynthesisResponse = serde_json::from_str(raw).unwrap();
        assert!(bridge().audio_url_from(parsed).is_none());
    }
}
