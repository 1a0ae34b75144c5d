/// Shell-style command line splitting for boot plan commands
///
/// Supports single quotes (literal), double quotes (backslash escapes `"` `\` `$` and
/// backtick only) and backslash escapes outside quotes. No expansion of any kind.
use crate::config::types::{BootError, Result};

#[derive(Clone, Copy, PartialEq)]
enum Quote {
    None,
    Single,
    Double,
}

/// Split a command line into argv tokens
pub fn split_command_line(line: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote = Quote::None;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match quote {
            Quote::Single => {
                if c == '\'' {
                    quote = Quote::None;
                } else {
                    current.push(c);
                }
            }
            Quote::Double => match c {
                '"' => quote = Quote::None,
                '\\' => match chars.next() {
                    Some(next @ ('"' | '\\' | '$' | '`')) => current.push(next),
                    Some(next) => {
                        current.push('\\');
                        current.push(next);
                    }
                    None => {
                        return Err(BootError::Config(format!(
                            "unterminated double quote in command: {}",
                            line
                        )))
                    }
                },
                _ => current.push(c),
            },
            Quote::None => match c {
                '\'' => {
                    quote = Quote::Single;
                    in_token = true;
                }
                '"' => {
                    quote = Quote::Double;
                    in_token = true;
                }
                '\\' => match chars.next() {
                    Some(next) => {
                        current.push(next);
                        in_token = true;
                    }
                    None => {
                        return Err(BootError::Config(format!(
                            "trailing backslash in command: {}",
                            line
                        )))
                    }
                },
                c if c.is_whitespace() => {
                    if in_token {
                        tokens.push(std::mem::take(&mut current));
                        in_token = false;
                    }
                }
                _ => {
                    current.push(c);
                    in_token = true;
                }
            },
        }
    }

    match quote {
        Quote::None => {}
        Quote::Single => {
            return Err(BootError::Config(format!(
                "unterminated single quote in command: {}",
                line
            )))
        }
        Quote::Double => {
            return Err(BootError::Config(format!(
                "unterminated double quote in command: {}",
                line
            )))
        }
    }

    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}
