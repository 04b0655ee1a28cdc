// ── Key templates and resource identities ──
//
// A key template is a device path with `{{field}}` placeholders. Filling
// the placeholders from declared values yields the device path; the same
// values serialised as `field=value|field=value` form the identity the
// host persists.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::schema::check_identity_value;
use crate::schema::validate::identity_string;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(String),
}

/// Parsed `{{field}}` device-path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl KeyTemplate {
    /// Tokenise a template. Placeholder names must match `[a-z_]+`.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let invalid = |reason: String| CoreError::InvalidSchema {
            path: raw.to_owned(),
            reason,
        };

        let mut segments = Vec::new();
        let mut rest = raw;
        while let Some(start) = rest.find(OPEN) {
            if start > 0 {
                segments.push(Segment::Literal(rest[..start].to_owned()));
            }
            let after = &rest[start + OPEN.len()..];
            let end = after
                .find(CLOSE)
                .ok_or_else(|| invalid("unterminated '{{' placeholder".into()))?;
            let name = after[..end].trim();
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_lowercase() || c == '_') {
                return Err(invalid(format!(
                    "placeholder '{name}' must match [a-z_]+"
                )));
            }
            segments.push(Segment::Field(name.to_owned()));
            rest = &after[end + CLOSE.len()..];
        }
        if rest.contains(CLOSE) {
            return Err(invalid("unmatched '}}'".into()));
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_owned()));
        }
        if raw.split_whitespace().next().is_none() {
            return Err(invalid("template must not be empty".into()));
        }

        Ok(Self {
            raw: raw.to_owned(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Placeholder names in order of first appearance.
    pub fn fields(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for segment in &self.segments {
            if let Segment::Field(name) = segment {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
        }
        out
    }

    /// `true` when the template has no placeholders (device-wide singleton).
    pub fn is_static(&self) -> bool {
        !self
            .segments
            .iter()
            .any(|s| matches!(s, Segment::Field(_)))
    }

    /// Device path with placeholders replaced by the declared values.
    pub fn build_path(&self, values: &Map<String, Value>) -> Result<String, CoreError> {
        self.render(|field| placeholder_value(values, field))
    }

    /// Device path with placeholders replaced from a parsed identity.
    pub fn build_path_from_id(&self, id: &ResourceId) -> Result<String, CoreError> {
        self.render(|field| {
            id.get(field)
                .map(str::to_owned)
                .ok_or_else(|| CoreError::InvalidIdentity {
                    id: id.to_string(),
                    reason: format!("missing field '{field}'"),
                })
        })
    }

    /// Identity of the declared values: `field=value|field=value`.
    pub fn build_id(&self, values: &Map<String, Value>) -> Result<ResourceId, CoreError> {
        let mut pairs = Vec::new();
        for field in self.fields() {
            let value = placeholder_value(values, field)?;
            pairs.push((field.to_owned(), value));
        }
        Ok(ResourceId { pairs })
    }

    fn render(
        &self,
        mut lookup: impl FnMut(&str) -> Result<String, CoreError>,
    ) -> Result<String, CoreError> {
        let mut out = String::with_capacity(self.raw.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(name) => out.push_str(&lookup(name)?),
            }
        }
        Ok(out)
    }
}

impl fmt::Display for KeyTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Placeholder names of a raw template, in appearance order.
pub fn extract_fields(template: &str) -> Result<Vec<String>, CoreError> {
    Ok(KeyTemplate::parse(template)?
        .fields()
        .into_iter()
        .map(str::to_owned)
        .collect())
}

fn placeholder_value(values: &Map<String, Value>, field: &str) -> Result<String, CoreError> {
    let value = values
        .get(field)
        .ok_or_else(|| CoreError::validation(field, "key field is not set"))?;
    let raw = identity_string(value)
        .ok_or_else(|| CoreError::validation(field, "key fields must be scalars"))?;
    check_identity_value(&raw).map_err(|reason| CoreError::validation(field, reason))?;
    Ok(raw)
}

// ── ResourceId ──────────────────────────────────────────────────────

/// Parsed `field=value|field=value` identity, order preserved.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId {
    pairs: Vec<(String, String)>,
}

impl ResourceId {
    pub fn parse(id: &str) -> Result<Self, CoreError> {
        let invalid = |reason: String| CoreError::InvalidIdentity {
            id: id.to_owned(),
            reason,
        };

        let mut pairs: Vec<(String, String)> = Vec::new();
        for part in id.split('|') {
            let (field, value) = part
                .split_once('=')
                .ok_or_else(|| invalid(format!("'{part}' is not field=value")))?;
            if field.is_empty() || !field.chars().all(|c| c.is_ascii_lowercase() || c == '_') {
                return Err(invalid(format!("field '{field}' must match [a-z_]+")));
            }
            check_identity_value(value).map_err(&invalid)?;
            if pairs.iter().any(|(f, _)| f == field) {
                return Err(invalid(format!("field '{field}' appears twice")));
            }
            pairs.push((field.to_owned(), value.to_owned()));
        }
        Ok(Self { pairs })
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(f, _)| f == field)
            .map(|(_, v)| v.as_str())
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn to_map(&self) -> IndexMap<String, String> {
        self.pairs.iter().cloned().collect()
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (field, value)) in self.pairs.iter().enumerate() {
            if i > 0 {
                f.write_str("|")?;
            }
            write!(f, "{field}={value}")?;
        }
        Ok(())
    }
}

impl FromStr for ResourceId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
