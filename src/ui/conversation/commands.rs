use std::str::FromStr;

use crate::events::ChatMode;

use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Commands that can be invoked by starting a message with a leading slash.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, AsRefStr, IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum SlashCommand {
    /// Switch to a different mode (chat, think, study, code, document)
    Mode,
    /// Toggle web search for new generations
    Search,
    /// Start a fresh conversation
    New,
    /// Re-run the last prompt
    Retry,
    /// Show help
    Help,
    /// Exit the application
    Bye,
}

pub fn command_entries() -> Vec<CommandEntry> {
    SlashCommand::iter()
        .map(|command| CommandEntry {
            command,
            keyword: command.command(),
            description: command.description(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub command: SlashCommand,
    pub argument: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandEntry {
    pub command: SlashCommand,
    pub keyword: &'static str,
    pub description: &'static str,
}

impl ParsedCommand {
    pub fn argument(&self) -> Option<&str> {
        self.argument.as_deref()
    }

    pub fn mode_target(&self) -> Option<ChatMode> {
        if self.command != SlashCommand::Mode {
            return None;
        }
        ChatMode::parse(self.argument()?)
    }
}

impl SlashCommand {
    /// User-visible description shown in help.
    pub fn description(self) -> &'static str {
        match self {
            SlashCommand::Mode => "switch to a different mode (chat, think, study, code, document)",
            SlashCommand::Search => "toggle web search for new generations",
            SlashCommand::New => "start a fresh conversation",
            SlashCommand::Retry => "re-run the last prompt",
            SlashCommand::Help => "show available commands",
            SlashCommand::Bye => "exit the application",
        }
    }

    /// Command string without the leading '/'.
    pub fn command(self) -> &'static str {
        self.into()
    }

    /// Whether this command can be run while a generation is streaming.
    pub fn available_during_streaming(self) -> bool {
        match self {
            SlashCommand::Retry => false,
            SlashCommand::Mode
            | SlashCommand::Search
            | SlashCommand::New
            | SlashCommand::Help
            | SlashCommand::Bye => true,
        }
    }
}

/// Return all built-in commands paired with their command string.
pub fn built_in_slash_commands() -> Vec<(&'static str, SlashCommand)> {
    SlashCommand::iter().map(|c| (c.command(), c)).collect()
}

/// Parse a slash command from user input
pub fn parse_slash_command(input: &str) -> Option<ParsedCommand> {
    if !input.starts_with('/') {
        return None;
    }

    let mut parts = input[1..].split_whitespace();
    let head = parts.next()?;
    let rest: Vec<String> = parts.map(|s| s.to_string()).collect();

    let command = SlashCommand::from_str(head)
        .ok()
        .or_else(|| match head.to_lowercase().as_str() {
            "q" | "quit" | "exit" => Some(SlashCommand::Bye),
            "m" | "switch" => Some(SlashCommand::Mode),
            "s" | "web" => Some(SlashCommand::Search),
            "n" => Some(SlashCommand::New),
            "r" | "regen" => Some(SlashCommand::Retry),
            "h" | "?" => Some(SlashCommand::Help),
            _ => None,
        })?;

    let argument = if rest.is_empty() {
        None
    } else {
        Some(rest.join(" "))
    };

    Some(ParsedCommand { command, argument })
}

/// Get help text for all available commands
pub fn get_help_text() -> String {
    let mut help = String::from("Available commands:\n\n");
    for (command_str, command) in built_in_slash_commands() {
        help.push_str(&format!("/{} - {}\n", command_str, command.description()));
    }

    help.push_str("\nAliases: /q for /bye, /m for /mode, /s for /search, /n for /new, /r for /retry");
    help.push_str("\nUse /mode <chat|think|study|code|document> to jump directly to a mode.");
    help.push_str("\nPress Esc while the assistant is responding to stop the stream.");

    help
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_with_arguments() {
        let parsed = parse_slash_command("/mode code").unwrap();
        assert_eq!(parsed.command, SlashCommand::Mode);
        assert_eq!(parsed.mode_target(), Some(ChatMode::Code));
    }

    #[test]
    fn aliases_resolve() {
        assert_eq!(parse_slash_command("/q").unwrap().command, SlashCommand::Bye);
        assert_eq!(parse_slash_command("/s").unwrap().command, SlashCommand::Search);
        assert_eq!(parse_slash_command("/regen").unwrap().command, SlashCommand::Retry);
    }

    #[test]
    fn plain_text_is_not_a_command() {
        assert!(parse_slash_command("hello /mode").is_none());
        assert!(parse_slash_command("/definitely-not-a-command").is_none());
    }
}
