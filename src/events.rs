use serde::{Deserialize, Serialize};

/// Generation modes supported by the Vaelis backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    /// General conversation
    Chat,
    /// Deeper reasoning over a question
    Think,
    /// Tutoring and explanations
    Study,
    /// Code generation and review
    Code,
    /// Long-form writing and documents
    Document,
}

impl ChatMode {
    /// Mode string as sent on the wire
    pub fn wire_name(&self) -> &'static str {
        match self {
            ChatMode::Chat => "chat",
            ChatMode::Think => "think",
            ChatMode::Study => "study",
            ChatMode::Code => "code",
            ChatMode::Document => "document",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ChatMode::Chat => "Chat",
            ChatMode::Think => "Think",
            ChatMode::Study => "Study",
            ChatMode::Code => "Code",
            ChatMode::Document => "Document",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ChatMode::Chat => "Everyday conversation with the assistant",
            ChatMode::Think => "Slower, more deliberate reasoning",
            ChatMode::Study => "Explanations, summaries, and tutoring",
            ChatMode::Code => "Code generation and review",
            ChatMode::Document => "Drafting long-form documents",
        }
    }

    /// Parse a user-supplied mode name (CLI flag or `/mode` argument)
    pub fn parse(input: &str) -> Option<ChatMode> {
        match input.trim().to_lowercase().as_str() {
            "chat" => Some(ChatMode::Chat),
            "think" => Some(ChatMode::Think),
            "study" => Some(ChatMode::Study),
            "code" => Some(ChatMode::Code),
            "doc" | "document" => Some(ChatMode::Document),
            _ => None,
        }
    }
}

impl Default for ChatMode {
    fn default() -> Self {
        ChatMode::Chat
    }
}

/// Role in conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationRole {
    User,
    Assistant,
    System,
}

impl ConversationRole {
    /// Role string as stored by the backend
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationRole::User => "user",
            ConversationRole::Assistant => "assistant",
            ConversationRole::System => "system",
        }
    }

    /// Parse a role string from a persisted message; unknown roles render as system notes
    pub fn parse(input: &str) -> ConversationRole {
        match input {
            "user" => ConversationRole::User,
            "assistant" => ConversationRole::Assistant,
            _ => ConversationRole::System,
        }
    }
}
