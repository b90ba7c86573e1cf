use crate::error::ChatError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    New,
    List,
    Open(i64),
    Profile,
    Suggest(Option<usize>),
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Empty,
    Message(String),
    Command(ShellCommand),
}

/// Lines starting with `/` are commands, everything else is a question for
/// the astrologer.
pub fn parse_input(line: &str) -> Result<Input, ChatError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Input::Empty);
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Input::Message(line.to_string()));
    };

    let mut parts = rest.split_whitespace();
    let name = parts.next().unwrap_or_default().to_lowercase();
    let arg = parts.next();

    let command = match name.as_str() {
        "new" => ShellCommand::New,
        "list" | "chats" => ShellCommand::List,
        "open" => {
            let raw = arg.ok_or_else(|| ChatError::validation("Usage: /open <chat id>"))?;
            let id = raw
                .parse::<i64>()
                .map_err(|_| ChatError::validation(format!("'{}' is not a chat id", raw)))?;
            ShellCommand::Open(id)
        }
        "profile" => ShellCommand::Profile,
        "suggest" => {
            let pick = match arg {
                Some(raw) =>
                    Some(
                        raw
                            .parse::<usize>()
                            .ok()
                            .filter(|n| *n > 0)
                            .ok_or_else(|| ChatError::validation(format!("'{}' is not a suggestion number", raw)))?
                    ),
                None => None,
            };
            ShellCommand::Suggest(pick)
        }
        "help" | "?" => ShellCommand::Help,
        "quit" | "exit" => ShellCommand::Quit,
        other => {
            return Err(ChatError::validation(format!("Unknown command '/{}'. Type /help for the list.", other)));
        }
    };
    Ok(Input::Command(command))
}
