//! Parsing of interactive command lines.
//!
//! ```text
//! get <file>    download a file from an active peer
//! lap           list active peers
//! lpf           list my published files
//! pub <file>    publish a file from the share directory
//! sch <text>    search other peers' files
//! unp <file>    unpublish a file
//! xit | exit    log out and quit
//! ```

use thiserror::Error;

/// One command typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    Get(String),
    ListActivePeers,
    ListPublished,
    Publish(String),
    Search(String),
    Unpublish(String),
    Exit,
}

/// A line that is not a valid command.  `Display` is the text shown to the
/// user.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("Unknown command")]
    Unknown,
}

/// Shown once after login.
pub const AVAILABLE_COMMANDS: &str = "Available commands are: get, lap, lpf, pub, sch, unp, xit";

/// Parses one input line.
///
/// Returns `Ok(None)` for a blank line.
///
/// # Errors
///
/// Returns [`CommandError::Usage`] when a known command has the wrong number
/// of arguments and [`CommandError::Unknown`] otherwise.
pub fn parse_command(line: &str) -> Result<Option<UserCommand>, CommandError> {
    let mut words = line.split_whitespace();
    let Some(keyword) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match keyword {
        "get" => UserCommand::Get(single_arg(&args, "get <filename>")?),
        "pub" => UserCommand::Publish(single_arg(&args, "pub <filename>")?),
        "sch" => UserCommand::Search(single_arg(&args, "sch <substring>")?),
        "unp" => UserCommand::Unpublish(single_arg(&args, "unp <filename>")?),
        "lap" if args.is_empty() => UserCommand::ListActivePeers,
        "lpf" if args.is_empty() => UserCommand::ListPublished,
        "xit" | "exit" if args.is_empty() => UserCommand::Exit,
        _ => return Err(CommandError::Unknown),
    };
    Ok(Some(command))
}

fn single_arg(args: &[&str], usage: &'static str) -> Result<String, CommandError> {
    match args {
        [arg] => Ok((*arg).to_string()),
        _ => Err(CommandError::Usage(usage)),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_argument_commands() {
        assert_eq!(parse_command("get a.txt"), Ok(Some(UserCommand::Get("a.txt".into()))));
        assert_eq!(parse_command("pub a.txt"), Ok(Some(UserCommand::Publish("a.txt".into()))));
        assert_eq!(parse_command("sch rep"), Ok(Some(UserCommand::Search("rep".into()))));
        assert_eq!(parse_command("unp a.txt"), Ok(Some(UserCommand::Unpublish("a.txt".into()))));
    }

    #[test]
    fn test_parse_bare_commands_and_exit_aliases() {
        assert_eq!(parse_command("lap"), Ok(Some(UserCommand::ListActivePeers)));
        assert_eq!(parse_command("lpf"), Ok(Some(UserCommand::ListPublished)));
        assert_eq!(parse_command("xit"), Ok(Some(UserCommand::Exit)));
        assert_eq!(parse_command("exit"), Ok(Some(UserCommand::Exit)));
    }

    #[test]
    fn test_surrounding_whitespace_is_ignored() {
        assert_eq!(parse_command("  pub   a.txt \n"), Ok(Some(UserCommand::Publish("a.txt".into()))));
    }

    #[test]
    fn test_blank_line_is_no_command() {
        assert_eq!(parse_command("   "), Ok(None));
    }

    #[test]
    fn test_wrong_arity_prints_usage() {
        let err = parse_command("pub").unwrap_err();
        assert_eq!(err.to_string(), "Usage: pub <filename>");

        let err = parse_command("sch a b").unwrap_err();
        assert_eq!(err.to_string(), "Usage: sch <substring>");
    }

    #[test]
    fn test_unknown_keywords() {
        assert_eq!(parse_command("publish a.txt"), Err(CommandError::Unknown));
        assert_eq!(parse_command("lap extra"), Err(CommandError::Unknown));
        assert_eq!(CommandError::Unknown.to_string(), "Unknown command");
    }
}
