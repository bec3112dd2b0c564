//! Message templates with `{{ placeholder }}` substitution.
//!
//! A [`Template`] is parsed once (at configuration load) and rendered for
//! every notification. Rendering is pure: the same template and metadata
//! always produce the same text.
//!
//! ## Placeholders
//!
//! | Placeholder | Value |
//! |-------------|-------|
//! | `workflow.name` | workflow name |
//! | `workflow.version` | workflow version, or empty |
//! | `workflow.project`, `workflow.domain` | execution project / domain |
//! | `launch_plan.name`, `launch_plan.version` | launch plan name / version |
//! | `project`, `domain`, `name` | execution project, domain, and name |
//! | `phase` | lower-case phase (`succeeded`, `timed_out`, ...) |
//! | `error` | ` The execution failed with error: [<message>].` or empty |
//!
//! Unknown placeholders are left in the output exactly as written.

use std::borrow::Cow;

use crate::{ExecutionMetadata, TemplateError};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder { key: String, raw: String },
}

/// A parsed message template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parses `source`, failing only when a `{{` is never closed.
    pub fn parse(source: impl Into<String>) -> Result<Self, TemplateError> {
        let source = source.into();
        let mut segments = Vec::new();
        let mut rest = source.as_str();
        let mut offset = 0;

        while let Some(start) = rest.find("{{") {
            if start > 0 {
                segments.push(Segment::Literal(rest[..start].to_string()));
            }
            let inner = &rest[start + 2..];
            let end = inner.find("}}").ok_or(TemplateError::Unterminated {
                offset: offset + start,
            })?;
            let consumed = start + 2 + end + 2;
            segments.push(Segment::Placeholder {
                key: inner[..end].trim().to_string(),
                raw: rest[start..consumed].to_string(),
            });
            offset += consumed;
            rest = &rest[consumed..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self { source, segments })
    }

    /// The template text as configured.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Placeholder keys referenced by this template, in order of appearance.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Placeholder { key, .. } => Some(key.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Substitutes every recognised placeholder from `execution`.
    pub fn render(&self, execution: &ExecutionMetadata) -> String {
        let mut out = String::with_capacity(self.source.len() + 64);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder { key, raw } => match lookup(key, execution) {
                    Some(value) => out.push_str(&value),
                    None => out.push_str(raw),
                },
            }
        }
        out
    }
}

/// Parses and renders in one step.
pub fn render(source: &str, execution: &ExecutionMetadata) -> Result<String, TemplateError> {
    Ok(Template::parse(source)?.render(execution))
}

/// Returns `None` for unknown keys. Known keys with no value render empty.
fn lookup<'a>(key: &str, execution: &'a ExecutionMetadata) -> Option<Cow<'a, str>> {
    let id = &execution.id;
    let value = match key {
        "workflow.name" => Cow::Borrowed(execution.workflow.name.as_str()),
        "workflow.version" => Cow::Borrowed(execution.workflow.version.as_deref().unwrap_or("")),
        "workflow.project" | "launch_plan.project" | "project" => {
            Cow::Borrowed(id.project.as_str())
        }
        "workflow.domain" | "launch_plan.domain" | "domain" => Cow::Borrowed(id.domain.as_str()),
        "launch_plan.name" => Cow::Borrowed(execution.launch_plan.name.as_str()),
        "launch_plan.version" => {
            Cow::Borrowed(execution.launch_plan.version.as_deref().unwrap_or(""))
        }
        "name" => Cow::Borrowed(id.name.as_str()),
        "phase" => Cow::Borrowed(execution.phase.template_name()),
        "error" => match execution.error.as_deref() {
            Some(message) if !message.is_empty() => Cow::Owned(format!(
                " The execution failed with error: [{message}]."
            )),
            _ => Cow::Borrowed(""),
        },
        _ => return None,
    };
    Some(value)
}
