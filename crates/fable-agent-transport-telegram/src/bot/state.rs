use serde::{Deserialize, Serialize};

/// Conversation state tracked per chat.
#[derive(Clone, Serialize, Deserialize, Default)]
pub enum State {
    /// Default state outside any scene.
    #[default]
    Idle,
    /// Voice conversation scene.
    ChatVoice,
}
