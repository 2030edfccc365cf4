use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::api::ConversionRequest;
use crate::error::AppError;
use crate::synth::Synthesizer;

/// Every conversion overwrites this file.
pub const OUTPUT_FILE_NAME: &str = "audioFile.mp3";

/// Response envelope from the synthesizer.
#[derive(Debug, Deserialize)]
struct SynthesisEnvelope {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug)]
pub enum ConversionOutcome {
    Converted { path: PathBuf, bytes: usize },
    Degraded(AppError),
}

impl ConversionOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            ConversionOutcome::Converted { .. } => "ok",
            ConversionOutcome::Degraded(_) => "degraded",
        }
    }
}

/// Runs conversions one at a time and persists the resulting audio.
///
/// The slot is a fair `tokio` mutex, so waiting conversions run in the order
/// they arrived. It is held across both the synthesizer call and the file
/// write.
pub struct ConversionGateway {
    synth: Arc<dyn Synthesizer>,
    output_path: PathBuf,
    slot: Mutex<()>,
}

impl ConversionGateway {
    pub fn new(synth: Arc<dyn Synthesizer>, output_path: PathBuf) -> Self {
        Self {
            synth,
            output_path,
            slot: Mutex::new(()),
        }
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Convert one request. Pipeline failures never escape; they come back as
    /// [`ConversionOutcome::Degraded`] after being logged.
    pub async fn convert(&self, request: &ConversionRequest) -> ConversionOutcome {
        let _slot = self.slot.lock().await;

        match self.run(request).await {
            Ok(bytes) => ConversionOutcome::Converted {
                path: self.output_path.clone(),
                bytes,
            },
            Err(e) => {
                match &e {
                    AppError::SynthesisDecodeFailure(_) => {
                        tracing::warn!(code = e.code(), "conversion skipped: {}", e)
                    }
                    _ => tracing::error!(code = e.code(), "conversion failed: {}", e),
                }
                ConversionOutcome::Degraded(e)
            }
        }
    }

    async fn run(&self, request: &ConversionRequest) -> Result<usize, AppError> {
        let envelope = self
            .synth
            .synthesize(&request.conversation, &request.speaker_data)
            .await?;

        let audio = decode_envelope(&envelope)?;
        persist_atomically(&self.output_path, &audio).await?;

        Ok(audio.len())
    }
}

/// Extract the audio bytes from a synthesizer response.
pub fn decode_envelope(raw: &[u8]) -> Result<Vec<u8>, AppError> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| AppError::SynthesisDecodeFailure(format!("response is not UTF-8: {}", e)))?;

    let envelope = parse_envelope(text)?;

    if envelope.success == Some(false) {
        let reason = envelope.text.unwrap_or_else(|| "no reason given".to_string());
        return Err(AppError::SynthesisFailed(format!(
            "synthesizer reported failure: {}",
            reason
        )));
    }

    let audio_base64 = envelope
        .text
        .ok_or_else(|| AppError::SynthesisDecodeFailure("missing 'text' field".into()))?;

    general_purpose::STANDARD
        .decode(audio_base64.trim())
        .map_err(|e| AppError::SynthesisDecodeFailure(format!("invalid base64 audio: {}", e)))
}

fn parse_envelope(text: &str) -> Result<SynthesisEnvelope, AppError> {
    match serde_json::from_str(text.trim()) {
        Ok(envelope) => Ok(envelope),
        Err(whole) => {
            // Libraries that print progress to stdout put the envelope last.
            let last_line = text.lines().map(str::trim).filter(|l| !l.is_empty()).last();
            match last_line {
                Some(line) if line.len() < text.trim().len() => serde_json::from_str(line)
                    .map_err(|e| AppError::SynthesisDecodeFailure(format!("response is not JSON: {}", e))),
                _ => Err(AppError::SynthesisDecodeFailure(format!(
                    "response is not JSON: {}",
                    whole
                ))),
            }
        }
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| OUTPUT_FILE_NAME.to_string());
    path.with_file_name(format!(".{}.partial", name))
}

/// Write to a hidden sibling first and rename it into place, so readers see
/// either the previous file or the complete new one.
async fn persist_atomically(path: &Path, bytes: &[u8]) -> Result<(), AppError> {
    let partial = partial_path(path);

    let result = async {
        tokio::fs::write(&partial, bytes).await?;
        tokio::fs::rename(&partial, path).await
    }
    .await;

    if let Err(e) = result {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(AppError::FileWriteFailure(format!("{}: {}", path.display(), e)));
    }

    Ok(())
}
