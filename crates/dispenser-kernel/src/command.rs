/// Commands understood after the configured chat prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Give,
    Count,
    Add(Option<String>),
    Help,
}

pub const COMMAND_NAMES: &[&str] = &["give", "count", "add", "help"];

/// Parses `content` as `<prefix><command> [argument]`.
///
/// Prefix and command name are matched ASCII case-insensitively. Only the
/// first argument token is kept for `add`.
pub fn parse_command(prefix: &str, content: &str) -> Option<Command> {
    let content = content.trim_start();
    let rest = content
        .get(..prefix.len())
        .filter(|head| head.eq_ignore_ascii_case(prefix))
        .map(|_| &content[prefix.len()..])?;

    let mut parts = rest.split_whitespace();
    let name = parts.next()?.to_ascii_lowercase();
    match name.as_str() {
        "give" => Some(Command::Give),
        "count" => Some(Command::Count),
        "add" => Some(Command::Add(parts.next().map(str::to_string))),
        "help" => Some(Command::Help),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = "$key ";

    #[test]
    fn parses_known_commands() {
        assert_eq!(parse_command(PREFIX, "$key give"), Some(Command::Give));
        assert_eq!(parse_command(PREFIX, "$key count"), Some(Command::Count));
        assert_eq!(parse_command(PREFIX, "$key help"), Some(Command::Help));
        assert_eq!(
            parse_command(PREFIX, "$key add ABCD1-EFGH2-IJKL3"),
            Some(Command::Add(Some("ABCD1-EFGH2-IJKL3".to_string())))
        );
    }

    #[test]
    fn is_case_insensitive() {
        assert_eq!(parse_command(PREFIX, "$KEY GIVE"), Some(Command::Give));
        assert_eq!(parse_command(PREFIX, "  $Key Count  "), Some(Command::Count));
    }

    #[test]
    fn add_without_argument_is_still_add() {
        assert_eq!(parse_command(PREFIX, "$key add"), Some(Command::Add(None)));
    }

    #[test]
    fn ignores_other_messages() {
        assert_eq!(parse_command(PREFIX, "give me a key"), None);
        assert_eq!(parse_command(PREFIX, "$keygive"), None);
        assert_eq!(parse_command(PREFIX, "$key "), None);
        assert_eq!(parse_command(PREFIX, "$key steal"), None);
        assert_eq!(parse_command(PREFIX, "€"), None);
    }
}
