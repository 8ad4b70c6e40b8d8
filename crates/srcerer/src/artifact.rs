// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The blob artifact format.
//!
//! One artifact per component, written to `<bin>/<name>.js`:
//!
//! ```text
//! //# sourceURL=main
//! ({
//! name:"main",
//! css:".main{color:red}",
//! svg:"<svg>…</svg>",
//! mvc:__srcerer.register("main",function(){…})
//! })
//! ```
//!
//! The source URL line is only written in debug builds. `css`, `svg` and
//! `mvc` are present only when the blob has that sub-asset. String payloads
//! are JSON-escaped, so the whole file is a valid script expression and can
//! also be read back with [`Artifact::parse`].

use crate::error::{Result, SrcererError};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Deserializer;

/// Name of the client-side registry object the behavior shim calls into.
pub const REGISTRY: &str = "__srcerer";

/// Extension of written artifacts.
pub const ARTIFACT_EXTENSION: &str = "js";

const SOURCE_URL: &str = "//# sourceURL=";

lazy_static! {
    static ref REGISTER_RE: Regex =
        Regex::new(r#"^\s*__srcerer\.register\(\s*("(?:[^"\\]|\\.)*")"#).unwrap();
}

/// A compiled component: name tag plus optional style, sprite and behavior.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Artifact {
    /// Blob name.
    pub name: String,
    /// Compiled CSS.
    pub css: Option<String>,
    /// Optimized sprite markup.
    pub svg: Option<String>,
    /// Behavior code wrapped in the registration shim.
    pub mvc: Option<String>,
}

impl Artifact {
    /// Creates an artifact with only a name tag.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Serializes the artifact. `debug` adds the source URL line.
    pub fn encode(&self, debug: bool) -> String {
        let mut out = String::new();
        if debug {
            out.push_str(SOURCE_URL);
            out.push_str(&self.name);
            out.push('\n');
        }

        let mut fields = vec![format!("name:{}", json_string(&self.name))];
        if let Some(css) = &self.css {
            fields.push(format!("css:{}", json_string(css)));
        }
        if let Some(svg) = &self.svg {
            fields.push(format!("svg:{}", json_string(svg)));
        }
        if let Some(mvc) = &self.mvc {
            fields.push(format!("mvc:{}", mvc));
        }

        out.push_str("({\n");
        out.push_str(&fields.join(",\n"));
        out.push_str("\n})");
        out
    }

    /// Reads an artifact produced by [`Artifact::encode`].
    pub fn parse(text: &str) -> Result<Self> {
        let mut body = text.trim_start();
        if body.starts_with(SOURCE_URL) {
            body = body.split_once('\n').map(|(_, rest)| rest).unwrap_or("");
        }

        let body = body
            .trim()
            .strip_prefix("({")
            .and_then(|b| b.strip_suffix("})"))
            .ok_or_else(|| invalid("?", "not a parenthesized object"))?;

        let mut artifact = Artifact::default();
        let mut rest = body.trim_start();

        while !rest.is_empty() {
            let (key, value) = rest
                .split_once(':')
                .ok_or_else(|| invalid(&artifact.name, "expected key"))?;
            let key = key.trim();

            if key == "mvc" {
                // always the last field
                artifact.mvc = Some(value.trim().to_string());
                break;
            }

            let mut stream = Deserializer::from_str(value).into_iter::<String>();
            let parsed = match stream.next() {
                Some(Ok(s)) => s,
                _ => return Err(invalid(&artifact.name, &format!("bad value for '{}'", key))),
            };
            let consumed = stream.byte_offset();

            match key {
                "name" => artifact.name = parsed,
                "css" => artifact.css = Some(parsed),
                "svg" => artifact.svg = Some(parsed),
                other => {
                    return Err(invalid(
                        &artifact.name,
                        &format!("unknown field '{}'", other),
                    ))
                }
            }

            rest = value[consumed..].trim_start();
            rest = rest.strip_prefix(',').unwrap_or(rest).trim_start();
        }

        if artifact.name.is_empty() {
            return Err(invalid("?", "missing name"));
        }
        Ok(artifact)
    }
}

/// Wraps behavior code in the registration shim.
///
/// In debug builds the code is kept on its own lines with a source URL of
/// `<name>.mvc`.
pub fn wrap_behavior(name: &str, code: &str, debug: bool) -> String {
    if debug {
        format!(
            "{}.register({},function(){{\n{}\n{}{}.mvc\n}})",
            REGISTRY,
            json_string(name),
            code,
            SOURCE_URL,
            name
        )
    } else {
        format!(
            "{}.register({},function(){{{}}})",
            REGISTRY,
            json_string(name),
            code
        )
    }
}

/// Returns the component name a registration shim registers, if `code`
/// is one.
pub fn registered_name(code: &str) -> Option<String> {
    let caps = REGISTER_RE.captures(code)?;
    serde_json::from_str(&caps[1]).ok()
}

fn json_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

fn invalid(name: &str, message: &str) -> SrcererError {
    SrcererError::InvalidArtifact {
        name: name.to_string(),
        message: message.to_string(),
    }
}
