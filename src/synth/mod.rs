pub mod subprocess;

use async_trait::async_trait;

use crate::error::AppError;

pub use subprocess::SubprocessSynthesizer;

/// The external text-to-speech capability.
///
/// Implementations receive the transcript and speaker metadata untouched and
/// return the raw response envelope, which is expected to be UTF-8 JSON with
/// a base64 `text` field. Decoding is left to the caller.
///
/// Implementations are not assumed to be re-entrant; callers must serialize
/// access (see [`crate::gateway::ConversionGateway`]).
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, conversation: &str, speaker_data: &str) -> Result<Vec<u8>, AppError>;
}
