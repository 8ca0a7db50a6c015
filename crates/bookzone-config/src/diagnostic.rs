// SPDX-FileCopyrightText: 2026 BookZone Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Config errors as miette diagnostics.
//!
//! Figment reports unknown keys, wrong types and missing keys with a key
//! path. Unknown keys are pointed at in `bookzone.toml` when the file is
//! known and get a "did you mean" hint for near-miss spellings such as
//! `typing_timout_ms`.

#![allow(unused_assignments)] // emitted by the miette derive

use figment::error::{Error as FigmentError, Kind};
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Jaro-Winkler score a key must beat to be offered as a correction.
const SUGGESTION_THRESHOLD: f64 = 0.75;

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("`{key}` is not a bookzone setting")]
    #[diagnostic(
        code(bookzone::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), accepted))
    )]
    UnknownKey {
        key: String,
        suggestion: Option<String>,
        /// Keys accepted at the same level, comma separated.
        accepted: String,
        #[label("unknown key")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("`{key}` has the wrong type ({detail})")]
    #[diagnostic(code(bookzone::config::invalid_type), help("use a {expected}"))]
    InvalidType {
        key: String,
        detail: String,
        expected: String,
    },

    #[error("`{key}` is required")]
    #[diagnostic(
        code(bookzone::config::missing_key),
        help("set `{key}` in bookzone.toml or via BOOKZONE_* environment variables")
    )]
    MissingKey { key: String },

    /// Raised by the checks in [`crate::validation`].
    #[error("invalid configuration: {message}")]
    #[diagnostic(code(bookzone::config::validation))]
    Validation { message: String },

    #[error("{0}")]
    #[diagnostic(code(bookzone::config::other))]
    Other(String),
}

impl ConfigError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        ConfigError::Validation {
            message: message.into(),
        }
    }

    fn from_figment(error: &FigmentError, sources: &[(String, String)]) -> Self {
        match &error.kind {
            Kind::UnknownField(field, expected) => {
                let location = locate(error, field, sources);
                ConfigError::UnknownKey {
                    key: field.clone(),
                    suggestion: suggest_key(field, *expected),
                    accepted: expected.join(", "),
                    span: location.as_ref().map(|(span, _)| *span),
                    src: location.map(|(_, src)| src),
                }
            }
            Kind::MissingField(field) => ConfigError::MissingKey {
                key: key_path(error, Some(&**field)),
            },
            Kind::InvalidType(actual, expected) => ConfigError::InvalidType {
                key: key_path(error, None),
                detail: format!("got {actual}"),
                expected: expected.clone(),
            },
            _ => ConfigError::Other(error.to_string()),
        }
    }
}

fn unknown_key_help(suggestion: Option<&str>, accepted: &str) -> String {
    match suggestion {
        Some(key) => format!("did you mean `{key}`? accepted here: {accepted}"),
        None => format!("accepted here: {accepted}"),
    }
}

/// One diagnostic per figment error. `sources` pairs each loaded file path
/// (or `<inline>`) with its text.
pub fn collect_figment_errors(
    err: figment::Error,
    sources: &[(String, String)],
) -> Vec<ConfigError> {
    err.into_iter()
        .map(|error| ConfigError::from_figment(&error, sources))
        .collect()
}

/// Dotted path of the key `error` refers to, e.g. `chat.typing_timeout_ms`.
fn key_path(error: &FigmentError, leaf: Option<&str>) -> String {
    error
        .path
        .iter()
        .map(String::as_str)
        .chain(leaf)
        .collect::<Vec<_>>()
        .join(".")
}

fn locate(
    error: &FigmentError,
    field: &str,
    sources: &[(String, String)],
) -> Option<(SourceSpan, NamedSource<String>)> {
    let file = error.metadata.as_ref().and_then(|m| match &m.source {
        Some(figment::Source::File(path)) => Some(path.display().to_string()),
        _ => None,
    });
    // Inline TOML has no file name; it is the only source in that case.
    let (name, text) = match file {
        Some(file) => sources.iter().find(|(name, _)| *name == file)?,
        None if sources.len() == 1 => &sources[0],
        None => return None,
    };
    let offset = find_key_offset(text, &error.path, field)?;
    Some((
        SourceSpan::new(offset.into(), field.len()),
        NamedSource::new(name, text.clone()),
    ))
}

/// Byte offset of `field` inside the table named by `section`.
///
/// An empty `section` searches from the top of the file. `[[auth.users]]`
/// entries are found by their full dotted name; any other nested table
/// falls back to its top-level header.
pub fn find_key_offset(content: &str, section: &[String], field: &str) -> Option<usize> {
    let start = match section.first() {
        None => 0,
        Some(top) => {
            let dotted = section.join(".");
            let headers = [format!("[{dotted}]"), format!("[[{dotted}]]"), format!("[{top}]")];
            headers
                .iter()
                .find_map(|h| content.find(h.as_str()).map(|at| at + h.len()))?
        }
    };

    let mut line_start = start;
    for line in content[start..].split_inclusive('\n') {
        let indent = line.len() - line.trim_start().len();
        let rest = &line[indent..];
        if rest
            .strip_prefix(field)
            .is_some_and(|tail| tail.starts_with([' ', '\t', '=']))
        {
            return Some(line_start + indent);
        }
        line_start += line.len();
    }
    None
}

/// Closest accepted key to `unknown`, if any is close enough.
pub fn suggest_key<S: AsRef<str>>(unknown: &str, accepted: &[S]) -> Option<String> {
    accepted
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key.as_ref()), key.as_ref()))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Print every error to stderr with miette's graphical report.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = miette::GraphicalReportHandler::new();
    for error in errors {
        let mut report = String::new();
        match handler.render_report(&mut report, error) {
            Ok(()) => eprint!("{report}"),
            Err(_) => eprintln!("bookzone: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAT_KEYS: [&str; 5] = [
        "max_message_chars",
        "recent_books_limit",
        "typing_timeout_ms",
        "session_buffer",
        "preview_chars",
    ];

    #[test]
    fn misspelled_chat_key_gets_suggestion() {
        assert_eq!(
            suggest_key("typing_timout_ms", &CHAT_KEYS).as_deref(),
            Some("typing_timeout_ms")
        );
        assert_eq!(
            suggest_key("recent_book_limit", &CHAT_KEYS).as_deref(),
            Some("recent_books_limit")
        );
    }

    #[test]
    fn unrelated_server_key_gets_none() {
        assert_eq!(suggest_key("listen_backlog", &["host", "port", "public_url"]), None);
    }

    #[test]
    fn key_offset_skips_earlier_sections() {
        let content = "[server]\nport = 8080\n\n[chat]\n  port = 2\n";
        let o = find_key_offset(content, &["chat".to_string()], "port").unwrap();
        assert_eq!(&content[o..o + 4], "port");
        assert!(o > content.find("[chat]").unwrap());
    }

    #[test]
    fn key_offset_requires_whole_key() {
        let content = "[storage]\ndatabase_path_old = \"x\"\nwal_mode = true\n";
        let section = ["storage".to_string()];
        assert_eq!(find_key_offset(content, &section, "database_path"), None);
        let o = find_key_offset(content, &section, "wal_mode").unwrap();
        assert_eq!(&content[o..o + 8], "wal_mode");
    }

    #[test]
    fn key_offset_in_auth_users_entry() {
        let content = "[[auth.users]]\ntoken = \"tok-alice\"\nuserid = \"alice\"\n";
        let section = ["auth".to_string(), "users".to_string()];
        let o = find_key_offset(content, &section, "userid").unwrap();
        assert_eq!(&content[o..o + 6], "userid");
    }
}
