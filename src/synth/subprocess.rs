use std::io::ErrorKind;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};

use super::Synthesizer;
use crate::error::AppError;

/// How long to keep reading stderr once the synthesizer has exited.
const STDERR_DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Request written to the synthesizer's stdin.
#[derive(Debug, Serialize)]
struct SynthesisInput<'a> {
    conversation: &'a str,
    speaker_data: &'a str,
}

/// Runs an external program once per conversion.
///
/// The program reads one JSON object `{"conversation", "speaker_data"}` from
/// stdin and prints the response envelope on stdout. Anything it writes to
/// stderr is forwarded to the log at debug level.
pub struct SubprocessSynthesizer {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl SubprocessSynthesizer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    async fn exchange(
        &self,
        child: &mut Child,
        input: &[u8],
    ) -> Result<(Vec<u8>, ExitStatus), AppError> {
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| AppError::SynthesisFailed("synthesizer stdin not available".into()))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::SynthesisFailed("synthesizer stdout not available".into()))?;

        // stdin and stdout are driven together so a large envelope cannot
        // fill the pipe while we are still writing the request.
        let write = async move {
            match stdin.write_all(input).await {
                Ok(()) => stdin.shutdown().await,
                // The program may exit without reading its input; its exit
                // status decides the outcome.
                Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
                Err(e) => Err(e),
            }
        };
        let read = async move {
            let mut buf = Vec::new();
            stdout.read_to_end(&mut buf).await.map(|_| buf)
        };

        let (_, envelope) = tokio::try_join!(write, read)
            .map_err(|e| AppError::SynthesisFailed(format!("synthesizer pipe error: {}", e)))?;

        let status = child
            .wait()
            .await
            .map_err(|e| AppError::SynthesisFailed(format!("failed to wait for synthesizer: {}", e)))?;

        Ok((envelope, status))
    }
}

#[async_trait]
impl Synthesizer for SubprocessSynthesizer {
    async fn synthesize(&self, conversation: &str, speaker_data: &str) -> Result<Vec<u8>, AppError> {
        let input = serde_json::to_vec(&SynthesisInput {
            conversation,
            speaker_data,
        })?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                AppError::SynthesisFailed(format!(
                    "failed to start '{}' (is it installed?): {}",
                    self.program, e
                ))
            })?;

        let stderr_task = child.stderr.take().map(|stderr| {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(synth_stderr = %line, "synthesizer log");
                }
            })
        });

        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.exchange(&mut child, &input))
                .await
                .unwrap_or_else(|_| {
                    Err(AppError::SynthesisFailed(format!(
                        "synthesizer timed out after {}s",
                        limit.as_secs_f32()
                    )))
                }),
            None => self.exchange(&mut child, &input).await,
        };

        // Anything the child spawned may keep stderr open after it is gone,
        // so the reader only gets a short grace period.
        if result.is_err() {
            let _ = child.start_kill();
        }
        if let Some(mut task) = stderr_task {
            let grace = if result.is_err() {
                Duration::ZERO
            } else {
                STDERR_DRAIN_GRACE
            };
            if tokio::time::timeout(grace, &mut task).await.is_err() {
                task.abort();
            }
        }

        let (envelope, status) = result?;
        if !status.success() {
            return Err(AppError::SynthesisFailed(format!(
                "'{}' exited with {}",
                self.program, status
            )));
        }

        tracing::debug!(bytes = envelope.len(), "synthesizer returned envelope");
        Ok(envelope)
    }
}
