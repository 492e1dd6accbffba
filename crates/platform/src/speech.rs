use anyhow::{Context, Result};
use std::process::{Child, Command, Stdio};

use crate::SpeechSink;

/// Environment variable carrying the utterance to the Windows synthesizer.
#[cfg_attr(not(windows), allow(dead_code))]
const SPEECH_TEXT_ENV: &str = "TALKTERM_SPEECH_TEXT";

/// Speaks by running one external process per utterance.
///
/// At most one utterance is in flight: a new `speak` or a `stop` kills the
/// previous process.
pub struct CommandSpeech {
    argv: Vec<String>,
    text_in_env: bool,
    current: Option<Child>,
}

impl CommandSpeech {
    /// Speak with `argv`, appending the text as the last argument.
    pub fn new(argv: Vec<String>) -> Self {
        Self {
            argv,
            text_in_env: false,
            current: None,
        }
    }

    /// The platform's built-in speech program, if one is installed.
    #[cfg(target_os = "macos")]
    pub fn system() -> Option<Self> {
        which::which("say")
            .ok()
            .map(|_| Self::new(vec!["say".to_string()]))
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    pub fn system() -> Option<Self> {
        ["spd-say", "espeak-ng", "espeak"]
            .into_iter()
            .find(|program| which::which(program).is_ok())
            .map(|program| Self::new(vec![program.to_string()]))
    }

    #[cfg(windows)]
    pub fn system() -> Option<Self> {
        let script = format!(
            "Add-Type -AssemblyName System.Speech; \
             (New-Object System.Speech.Synthesis.SpeechSynthesizer).Speak($env:{})",
            SPEECH_TEXT_ENV
        );
        Some(Self {
            argv: vec![
                "powershell.exe".to_string(),
                "-NoProfile".to_string(),
                "-Command".to_string(),
                script,
            ],
            text_in_env: true,
            current: None,
        })
    }

    fn command(&self, text: &str) -> Option<Command> {
        let (program, args) = self.argv.split_first()?;
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if self.text_in_env {
            cmd.env(SPEECH_TEXT_ENV, text);
        } else {
            cmd.arg(text);
        }
        Some(cmd)
    }

    fn start(&mut self, text: &str) -> Result<()> {
        let Some(mut cmd) = self.command(text) else {
            return Ok(());
        };
        let child = cmd
            .spawn()
            .with_context(|| format!("Failed to run speech command {:?}", self.argv[0]))?;
        self.current = Some(child);
        Ok(())
    }

    /// Block until the in-flight utterance finishes.
    #[cfg(test)]
    fn finish(&mut self) {
        if let Some(mut child) = self.current.take() {
            let _ = child.wait();
        }
    }
}

impl SpeechSink for CommandSpeech {
    fn speak(&mut self, text: &str) {
        self.stop();
        if let Err(e) = self.start(text) {
            tracing::warn!("{:#}", e);
        }
    }

    fn stop(&mut self) {
        let Some(mut child) = self.current.take() else {
            return;
        };
        // Already finished utterances only need reaping
        if let Ok(None) = child.try_wait() {
            if let Err(e) = child.kill() {
                tracing::debug!("Kill speech process: {}", e);
            }
        }
        let _ = child.wait();
    }
}

impl Drop for CommandSpeech {
    fn drop(&mut self) {
        self.stop();
    }
}
