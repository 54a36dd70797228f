//! PromptFramer: renders a conversation view as a two-party transcript.
//!
//! The model never sees a user/assistant exchange. Instead, the history is
//! written into the system text as `"<name>: <content>"` lines and the model
//! is cued to continue the transcript as the responder. Stop markers on both
//! persona names keep it from writing the other party's next line.

use parley_types::chat::{Role, Utterance};
use parley_types::config::FramingConfig;

/// Everything the model call needs to continue the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramingDirective {
    /// Preamble followed by one line per utterance.
    pub text: String,
    /// Trailing assistant prefix, e.g. `"friend 2:"`.
    pub cue: String,
    pub stop_markers: Vec<String>,
}

/// Pure, deterministic transcript framer.
#[derive(Debug, Clone)]
pub struct PromptFramer {
    initiator_name: String,
    responder_name: String,
    preamble: String,
}

impl PromptFramer {
    /// Build a framer, substituting `{initiator}` and `{responder}` in the
    /// configured preamble.
    pub fn new(config: &FramingConfig) -> Self {
        let preamble = config
            .preamble
            .replace("{initiator}", &config.initiator_name)
            .replace("{responder}", &config.responder_name);
        Self {
            initiator_name: config.initiator_name.clone(),
            responder_name: config.responder_name.clone(),
            preamble,
        }
    }

    pub fn display_name(&self, role: Role) -> &str {
        match role {
            Role::Initiator => &self.initiator_name,
            Role::Responder => &self.responder_name,
        }
    }

    pub fn frame(&self, history: &[Utterance]) -> FramingDirective {
        let mut text = self.preamble.clone();
        for utterance in history {
            text.push_str(self.display_name(utterance.role));
            text.push_str(": ");
            text.push_str(&utterance.content);
            text.push('\n');
        }

        FramingDirective {
            text,
            cue: format!("{}:", self.responder_name),
            stop_markers: vec![
                format!("{}:", self.initiator_name),
                format!("{}:", self.responder_name),
            ],
        }
    }
}

impl Default for PromptFramer {
    fn default() -> Self {
        Self::new(&FramingConfig::default())
    }
}
