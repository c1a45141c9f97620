// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! `%{attribute}` templates used for source metadata and Graphite metric paths.
//!
//! A template is compiled once from configuration into a list of segments and evaluated on
//! every flush against the batch's [`Fields`]:
//!
//! ```text
//! "k8s/%{namespace}/%{pod}"  ->  [Literal("k8s/"), Attribute("namespace"),
//!                                 Literal("/"), Attribute("pod")]
//! ```

use std::borrow::Cow;

use crate::errors::TemplateError;
use crate::fields::Fields;

/// Value substituted for attributes missing from the fields.
pub const UNDEFINED: &str = "undefined";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Attribute(String),
}

/// A compiled template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceFormat {
    segments: Vec<Segment>,
}

impl SourceFormat {
    /// Compiles `template`. An opening `%{` must be closed by `}` and name at least one
    /// character; a `%` or `}` on its own is literal text.
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = template;
        let mut offset = 0;

        while let Some(start) = rest.find("%{") {
            literal.push_str(&rest[..start]);
            let after_open = &rest[start + 2..];
            let Some(end) = after_open.find('}') else {
                return Err(TemplateError::Unclosed {
                    template: template.to_string(),
                    position: offset + start,
                });
            };
            let name = &after_open[..end];
            if name.is_empty() {
                return Err(TemplateError::EmptyName {
                    template: template.to_string(),
                    position: offset + start,
                });
            }
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Attribute(name.to_string()));

            let consumed = start + 2 + end + 1;
            offset += consumed;
            rest = &rest[consumed..];
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { segments })
    }

    /// Whether the template produces anything at all. Unset templates are not sent.
    #[must_use]
    pub fn is_set(&self) -> bool {
        !self.segments.is_empty()
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Evaluates the template against `fields`, rendering missing attributes as
    /// [`UNDEFINED`].
    #[must_use]
    pub fn format(&self, fields: &Fields) -> String {
        self.render_with(|name| fields.get(name).map(Cow::Borrowed), UNDEFINED)
    }

    /// Evaluates the template with an arbitrary lookup. `missing` is used for names the lookup
    /// does not resolve.
    pub fn render_with<'a, F>(&self, mut lookup: F, missing: &str) -> String
    where
        F: FnMut(&str) -> Option<Cow<'a, str>>,
    {
        let mut rendered = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => rendered.push_str(text),
                Segment::Attribute(name) => match lookup(name) {
                    Some(value) => rendered.push_str(&value),
                    None => rendered.push_str(missing),
                },
            }
        }
        rendered
    }
}

/// The three source templates configured for the exporter.
#[derive(Debug, Clone, Default)]
pub struct SourceFormats {
    pub host: SourceFormat,
    pub category: SourceFormat,
    pub name: SourceFormat,
}

impl SourceFormats {
    pub fn new(host: &str, category: &str, name: &str) -> Result<Self, TemplateError> {
        Ok(Self {
            host: SourceFormat::parse(host)?,
            category: SourceFormat::parse(category)?,
            name: SourceFormat::parse(name)?,
        })
    }

    /// Evaluates the templates once for a whole batch. Unset templates yield `None`.
    #[must_use]
    pub fn evaluate(&self, fields: &Fields) -> SourceValues {
        let eval = |format: &SourceFormat| format.is_set().then(|| format.format(fields));
        SourceValues {
            host: eval(&self.host),
            category: eval(&self.category),
            name: eval(&self.name),
        }
    }
}

/// Source metadata rendered for one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceValues {
    pub host: Option<String>,
    pub category: Option<String>,
    pub name: Option<String>,
}
