//! Platform speech output.
//!
//! Text-to-speech goes through an external program: `say` on macOS,
//! `spd-say` or `espeak` on Linux, PowerShell's `System.Speech` on Windows,
//! or a user-configured command.

mod speech;

pub use speech::CommandSpeech;

use settings::{AccessibilityConfig, SpeechMode};

/// A text-to-speech sink.
pub trait SpeechSink {
    /// Speak `text`, interrupting whatever is being spoken.
    fn speak(&mut self, text: &str);

    /// Interrupt in-flight speech.
    fn stop(&mut self);
}

/// Sink for `screen-reader-mode = 0`.
#[derive(Debug, Default)]
pub struct SilentSpeech;

impl SpeechSink for SilentSpeech {
    fn speak(&mut self, _text: &str) {}

    fn stop(&mut self) {}
}

/// Build the speech sink selected by the accessibility config.
pub fn speech_for(config: &AccessibilityConfig) -> Box<dyn SpeechSink> {
    match config.speech_mode() {
        SpeechMode::Off => Box::new(SilentSpeech),
        SpeechMode::System => match CommandSpeech::system() {
            Some(speech) => Box::new(speech),
            None => {
                tracing::warn!("No system text-to-speech program found, speech disabled");
                Box::new(SilentSpeech)
            }
        },
        SpeechMode::Command => Box::new(CommandSpeech::new(config.speech_command.clone())),
    }
}
