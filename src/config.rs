// Server configuration, read once at startup from the environment

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub audio_dir: PathBuf,
    pub views_dir: PathBuf,
    pub synth_program: String,
    pub synth_args: Vec<String>,
    pub synth_timeout_secs: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            audio_dir: PathBuf::from("."),
            views_dir: PathBuf::from("Resources/Views"),
            synth_program: "python3".to_string(),
            synth_args: vec!["scripts/synthesize.py".to_string()],
            synth_timeout_secs: None,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let host = lookup("HOST").unwrap_or(defaults.host);

        let port = lookup("PORT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.port);

        let audio_dir = lookup("AUDIO_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.audio_dir);

        let views_dir = lookup("VIEWS_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.views_dir);

        let synth_program = lookup("SYNTH_PROGRAM")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.synth_program);

        let synth_args = lookup("SYNTH_ARGS")
            .map(|args| args.split_whitespace().map(str::to_string).collect())
            .unwrap_or(defaults.synth_args);

        // 0 disables the timeout
        let synth_timeout_secs = lookup("SYNTH_TIMEOUT_SECS")
            .and_then(|v| v.parse().ok())
            .filter(|secs: &u64| *secs > 0);

        Self {
            host,
            port,
            audio_dir,
            views_dir,
            synth_program,
            synth_args,
            synth_timeout_secs,
        }
    }

    pub fn synth_timeout(&self) -> Option<Duration> {
        self.synth_timeout_secs.map(Duration::from_secs)
    }
}
