//! # Command Tokenization and Bypass Policy
//!
//! Shell-aware tokenization deciding whether a command line is a single
//! simple invocation, and pattern matching deciding whether that invocation
//! may run without sandbox wrapping.
//!
//! The tokenizer is deliberately conservative. Redirects, pipes, sequencing,
//! subshells, and backticks are all attack surface for smuggling extra
//! effects past a bypass pattern, so any shell structure beyond one simple
//! command classifies the whole line as [`CommandTokens::Compound`], which
//! no pattern can ever match. The single exception is a narrow allowlist of
//! provably harmless trailing redirects (`2>/dev/null` and friends), which
//! is stripped before tokenization.

/// Result of tokenizing a command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandTokens {
    /// One simple command: program plus arguments, quoting resolved.
    Simple(Vec<String>),
    /// Anything with shell operators, unterminated quoting, or a trailing
    /// escape. Never eligible for bypass.
    Compound,
}

impl CommandTokens {
    pub fn is_compound(&self) -> bool {
        matches!(self, CommandTokens::Compound)
    }
}

/// Benign trailing redirects, most specific first. Only the first matching
/// suffix is stripped, and only once.
const SAFE_REDIRECT_SUFFIXES: &[&str] = &[
    ">/dev/null 2>&1",
    "> /dev/null 2>&1",
    "2>/dev/null",
    "2> /dev/null",
    "&>/dev/null",
    "2>&1",
];

/// Strips one recognized safe redirect suffix, if present.
///
/// The suffix must stand alone as a trailing word (preceded by whitespace or
/// the start of the line): `cmd 2>&1` strips, `cmd2>&1` does not, because
/// the shell would parse the latter as a redirect on a different command.
fn strip_safe_redirect(command: &str) -> &str {
    let trimmed = command.trim_end();
    for suffix in SAFE_REDIRECT_SUFFIXES {
        if let Some(rest) = trimmed.strip_suffix(suffix)
            && (rest.is_empty() || rest.ends_with(char::is_whitespace))
        {
            return rest.trim_end();
        }
    }
    trimmed
}

/// Tokenizes `command` with shell quoting rules.
///
/// Single quotes protect everything; double quotes protect whitespace;
/// backslash escapes the next character outside single quotes. Unquoted
/// shell operators (`| & ; < > ( )` and backtick) or a newline anywhere make
/// the command compound, as do unterminated quotes. Command substitution via
/// `$(...)` is caught by its parenthesis.
pub fn tokenize(command: &str) -> CommandTokens {
    let stripped = strip_safe_redirect(command.trim());

    let mut tokens: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut pending = false;
    let mut in_single = false;
    let mut in_double = false;
    let mut escaped = false;

    for c in stripped.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if !in_single => escaped = true,
            '\'' if !in_double => {
                in_single = !in_single;
                pending = true;
            }
            '"' if !in_single => {
                in_double = !in_double;
                pending = true;
            }
            '|' | '&' | ';' | '<' | '>' | '(' | ')' | '`' | '\n'
                if !in_single && !in_double =>
            {
                return CommandTokens::Compound;
            }
            c if c.is_whitespace() && !in_single && !in_double => {
                if pending || !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                    pending = false;
                }
            }
            c => {
                current.push(c);
                pending = true;
            }
        }
    }

    if escaped || in_single || in_double {
        return CommandTokens::Compound;
    }
    if pending || !current.is_empty() {
        tokens.push(current);
    }

    CommandTokens::Simple(tokens)
}

/// Returns true when `command` may run without sandbox wrapping under the
/// configured bypass `patterns`.
///
/// A compound command never matches. A pattern whose final token is a bare
/// `*` matches by token prefix with unbounded trailing tokens; any other
/// pattern requires token-for-token equality. Empty pattern strings are
/// skipped; whitespace on either side of commands and patterns is ignored.
pub fn is_unsandboxed_command(command: &str, patterns: &[String]) -> bool {
    let CommandTokens::Simple(command_tokens) = tokenize(command) else {
        tracing::debug!("Compound command is never eligible for bypass: {}", command);
        return false;
    };
    if command_tokens.is_empty() {
        return false;
    }

    for pattern in patterns {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            continue;
        }
        let CommandTokens::Simple(pattern_tokens) = tokenize(pattern) else {
            continue;
        };
        if pattern_tokens.is_empty() {
            continue;
        }
        if tokens_match(&command_tokens, &pattern_tokens) {
            tracing::debug!("Command matches bypass pattern '{}': {}", pattern, command);
            return true;
        }
    }
    false
}

fn tokens_match(command: &[String], pattern: &[String]) -> bool {
    if pattern.last().map(String::as_str) == Some("*") {
        let prefix = &pattern[..pattern.len() - 1];
        command.len() >= prefix.len()
            && prefix.iter().zip(command.iter()).all(|(p, c)| p == c)
    } else {
        command == pattern
    }
}
