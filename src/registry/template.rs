//! Command templates for handler invocations
//!
//! A template is the `command` sequence from a catalog entry: the first token
//! names the executable, the remaining tokens are arguments that may contain
//! the `{path}` placeholder. Literal braces are written as `{{` and `}}`.

use std::ffi::{OsStr, OsString};
use std::path::Path;
use thiserror::Error;

/// The only placeholder a template understands.
pub const PATH_PLACEHOLDER: &str = "{path}";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("command is empty")]
    Empty,
    #[error("executable token is empty")]
    EmptyExecutable,
    #[error("executable token must not contain a placeholder: {0:?}")]
    PlaceholderInExecutable(String),
    #[error("command never references {{path}}")]
    MissingPlaceholder,
    #[error("unknown placeholder {placeholder:?} in token {token:?}")]
    UnknownPlaceholder { token: String, placeholder: String },
    #[error("unbalanced brace in token {0:?}")]
    UnbalancedBrace(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Path,
}

/// One argument token split into literal text and placeholder slots.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ArgTemplate {
    segments: Vec<Segment>,
}

impl ArgTemplate {
    fn parse(token: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = token.char_indices().peekable();

        while let Some((idx, c)) = chars.next() {
            match c {
                '{' if matches!(chars.peek(), Some((_, '{'))) => {
                    chars.next();
                    literal.push('{');
                }
                '}' if matches!(chars.peek(), Some((_, '}'))) => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let rest = &token[idx..];
                    let end = rest
                        .find('}')
                        .ok_or_else(|| TemplateError::UnbalancedBrace(token.to_string()))?;
                    let placeholder = &rest[..=end];
                    if placeholder != PATH_PLACEHOLDER {
                        return Err(TemplateError::UnknownPlaceholder {
                            token: token.to_string(),
                            placeholder: placeholder.to_string(),
                        });
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Path);
                    // Skip the remaining characters of the placeholder.
                    for _ in 1..placeholder.chars().count() {
                        chars.next();
                    }
                }
                '}' => return Err(TemplateError::UnbalancedBrace(token.to_string())),
                other => literal.push(other),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { segments })
    }

    fn has_placeholder(&self) -> bool {
        self.segments.iter().any(|s| matches!(s, Segment::Path))
    }

    fn render(&self, path: &OsStr) -> OsString {
        let mut out = OsString::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push(text),
                Segment::Path => out.push(path),
            }
        }
        out
    }
}

/// A validated command template, ready to be materialized per invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    program: String,
    args: Vec<ArgTemplate>,
    tokens: Vec<String>,
}

impl CommandTemplate {
    pub fn parse(tokens: &[String]) -> Result<Self, TemplateError> {
        let (program, rest) = tokens.split_first().ok_or(TemplateError::Empty)?;

        if program.trim().is_empty() {
            return Err(TemplateError::EmptyExecutable);
        }
        if program.contains('{') || program.contains('}') {
            return Err(TemplateError::PlaceholderInExecutable(program.clone()));
        }

        let args = rest
            .iter()
            .map(|token| ArgTemplate::parse(token))
            .collect::<Result<Vec<_>, _>>()?;

        if !args.iter().any(ArgTemplate::has_placeholder) {
            return Err(TemplateError::MissingPlaceholder);
        }

        Ok(Self {
            program: program.clone(),
            args,
            tokens: tokens.to_vec(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// The tokens exactly as declared in the catalog.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Substitutes `path` into every placeholder, returning discrete argv tokens.
    pub fn render(&self, path: &Path) -> Vec<OsString> {
        self.args
            .iter()
            .map(|arg| arg.render(path.as_os_str()))
            .collect()
    }
}
