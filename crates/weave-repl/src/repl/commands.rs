//! REPL command parsing and definitions
//!
//! Handles parsing of dot-commands (.help, .quit, etc.) and the inspection
//! commands that take a class name.

use anyhow::{anyhow, Result};

/// Available REPL commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    /// Show help information
    Help,
    /// Exit the REPL
    Quit,
    /// Clear the screen
    Clear,
    /// Toggle quiet mode
    Quiet,
    /// Toggle debug mode
    Debug,
    /// Load a JSON manifest, replacing the current model
    Load(String),
    /// List configured target classes
    Classes,
    /// Show the resolved class context of a class
    Context(String),
    /// Build and show the target class definition of a class
    Describe(String),
    /// Build every configured class
    Validate,
}

impl ReplCommand {
    /// Commands whose output is reported with timing information
    pub fn is_timed(&self) -> bool {
        matches!(self, ReplCommand::Describe(_) | ReplCommand::Validate)
    }
}

/// Parse a command string into a ReplCommand
pub fn parse_command(input: &str) -> Result<ReplCommand> {
    let trimmed = input.trim();

    let Some(body) = trimmed.strip_prefix('.') else {
        return Err(anyhow!("Commands must start with '.'"));
    };

    let (name, argument) = match body.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (body, ""),
    };

    if name.is_empty() {
        return Err(anyhow!("Empty command"));
    }

    // class names may contain spaces inside generic argument lists
    let required = |usage: &str| {
        if argument.is_empty() {
            Err(anyhow!("Usage: {usage}"))
        } else {
            Ok(argument.to_string())
        }
    };

    match name {
        "help" | "h" => Ok(ReplCommand::Help),
        "quit" | "q" | "exit" => Ok(ReplCommand::Quit),
        "clear" | "cls" => Ok(ReplCommand::Clear),
        "quiet" => Ok(ReplCommand::Quiet),
        "debug" => Ok(ReplCommand::Debug),
        "load" => Ok(ReplCommand::Load(required(".load <manifest.json>")?)),
        "classes" | "list" => Ok(ReplCommand::Classes),
        "context" | "ctx" => Ok(ReplCommand::Context(required(".context <class>")?)),
        "describe" | "def" => Ok(ReplCommand::Describe(required(".describe <class>")?)),
        "validate" | "check" => Ok(ReplCommand::Validate),
        _ => Err(anyhow!("Unknown command: .{}", name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_help() {
        assert_eq!(parse_command(".help").unwrap(), ReplCommand::Help);
        assert_eq!(parse_command(".h").unwrap(), ReplCommand::Help);
    }

    #[test]
    fn test_parse_quit() {
        assert_eq!(parse_command(".quit").unwrap(), ReplCommand::Quit);
        assert_eq!(parse_command(".q").unwrap(), ReplCommand::Quit);
        assert_eq!(parse_command(".exit").unwrap(), ReplCommand::Quit);
    }

    #[test]
    fn test_parse_load() {
        match parse_command(".load  shop.json ").unwrap() {
            ReplCommand::Load(path) => assert_eq!(path, "shop.json"),
            other => panic!("Expected Load command, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_generic_class_name() {
        assert_eq!(
            parse_command(".describe Repository<Customer, Order>").unwrap(),
            ReplCommand::Describe("Repository<Customer, Order>".to_string())
        );
        assert_eq!(
            parse_command(".ctx Customer").unwrap(),
            ReplCommand::Context("Customer".to_string())
        );
    }

    #[test]
    fn test_timed_commands() {
        assert!(ReplCommand::Validate.is_timed());
        assert!(ReplCommand::Describe("Customer".to_string()).is_timed());
        assert!(!ReplCommand::Classes.is_timed());
    }

    #[test]
    fn test_parse_invalid_command() {
        assert!(parse_command(".invalid").is_err());
        assert!(parse_command("help").is_err()); // Missing dot
        assert!(parse_command(".describe").is_err()); // Missing argument
        assert!(parse_command(".").is_err());
    }
}
