//! Shader settings document
//!
//! The document is the raw text of `1_settings.glsl`. It is never rebuilt from a
//! tree: the parser derives a read-only [`ShaderView`] from it, and mutations
//! rewrite exactly one matched region of the text, leaving everything else as-is.
//!
//! Pipeline: `SettingsDocument` → `parse` → `ShaderView`; edits go
//! `SettingsDocument` → `mutation::*` → new `SettingsDocument` → `parse` again.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::error::EngineError;

pub mod mutation;
pub mod parser;
pub mod value;

pub use parser::parse;
pub use value::ValueKind;

/// Fixed text that both the parser and the mutations agree on.
pub mod grammar {
    /// Prefix of every shader identifier (`SHADER_FOO`).
    pub const SHADER_PREFIX: &str = "SHADER_";

    /// First line of the order block; regenerated verbatim on reorder.
    pub const ORDER_HEADER: &str = "const int SHADER_ORDER[SHADERS+1] = int[] ( // Don't change this line.";

    /// Start of the line closing the order block.
    pub const ORDER_SENTINEL: &str = "SHADERS);";

    /// Closing line written when the order block is regenerated.
    pub const ORDER_FOOTER: &str = "SHADERS); //";

    /// Closes a shader block.
    pub const BLOCK_END: &str = "#endif";

    /// Suffix of the enable directive name (`FOO_ENABLED`).
    pub const ENABLED_SUFFIX: &str = "_ENABLED";

    /// Comment label carrying the whitelist.
    pub const WHITELIST_LABEL: &str = "Whitelist:";

    /// Comment labels collected into a shader block tooltip.
    pub const BLOCK_TOOLTIP_LABELS: [&str; 3] = ["Description:", "Source:", "License:"];
}

/// The full text of one settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsDocument {
    text: String,
}

impl SettingsDocument {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    pub fn parse(&self) -> ShaderView {
        parser::parse(&self.text)
    }

    /// Read a document wholesale.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        std::fs::read_to_string(path)
            .map(Self::new)
            .map_err(|e| EngineError::io(path, e))
    }

    /// Write the whole buffer: open, truncate, write, close.
    ///
    /// The target must already exist; a missing canonical file is a not-found
    /// condition, not something to create behind the user's back.
    pub fn write_to(&self, path: &Path) -> Result<(), EngineError> {
        if !path.exists() {
            return Err(EngineError::NotFound { path: path.to_path_buf() });
        }
        let mut file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(path)
            .map_err(|e| EngineError::io(path, e))?;
        file.write_all(self.text.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| EngineError::io(path, e))
    }
}

impl fmt::Display for SettingsDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Comment lines attached to a shader block or a setting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Tooltip {
    lines: Vec<String>,
}

impl Tooltip {
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub(crate) fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    /// Hand over the collected lines, leaving the buffer empty.
    pub(crate) fn take(&mut self) -> Option<Tooltip> {
        if self.lines.is_empty() {
            None
        } else {
            Some(std::mem::take(self))
        }
    }

    /// Rich-text form for toolkits that render HTML tooltips.
    pub fn to_html(&self) -> String {
        let mut out = String::from("<html><head/><body>");
        for line in &self.lines {
            out.push_str("<p>");
            out.push_str(line);
            out.push_str("</p>");
        }
        out.push_str("</body></html>");
        out
    }
}

impl fmt::Display for Tooltip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lines.join("\n"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Setting {
    pub name: String,
    /// Raw value text as written in the document.
    pub value: String,
    pub kind: ValueKind,
    /// Type token of a `uniform` declaration (`float`, `vec3`, ...); `None` for `#define`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uniform_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<Tooltip>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShaderBlock {
    /// `SHADER_<NAME>`
    pub id: String,
    pub enabled: bool,
    /// Empty for disabled blocks.
    pub settings: Vec<Setting>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<Tooltip>,
}

impl ShaderBlock {
    /// Identifier without the `SHADER_` prefix.
    pub fn name(&self) -> &str {
        self.id.strip_prefix(grammar::SHADER_PREFIX).unwrap_or(&self.id)
    }

    /// "On" / "Off" indicator shown next to the identifier.
    pub fn status(&self) -> &'static str {
        if self.enabled {
            "On"
        } else {
            "Off"
        }
    }
}

/// Structured view derived from a document. Rebuilt on every parse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShaderView {
    /// Order block entries, without the `SHADER_` prefix.
    pub order: Vec<String>,
    /// Shader blocks in document order (not `order` order).
    pub shaders: Vec<ShaderBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whitelist: Option<String>,
}

/// One row of the shader table: a shader status row or one of its settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Row<'a> {
    Shader(&'a ShaderBlock),
    Setting(&'a ShaderBlock, &'a Setting),
}

impl ShaderView {
    pub fn shader(&self, id: &str) -> Option<&ShaderBlock> {
        self.shaders.iter().find(|s| s.id == id)
    }

    /// First setting with this name, with its owning block.
    pub fn setting(&self, name: &str) -> Option<(&ShaderBlock, &Setting)> {
        self.shaders
            .iter()
            .flat_map(|b| b.settings.iter().map(move |s| (b, s)))
            .find(|(_, s)| s.name == name)
    }

    /// Names (without prefix) of the enabled shaders, in document order.
    pub fn enabled_shaders(&self) -> Vec<&str> {
        self.shaders.iter().filter(|s| s.enabled).map(|s| s.name()).collect()
    }

    /// Flattened table rows: each block's status row followed by its settings.
    pub fn rows(&self) -> Vec<Row<'_>> {
        let mut rows = Vec::new();
        for block in &self.shaders {
            rows.push(Row::Shader(block));
            rows.extend(block.settings.iter().map(|s| Row::Setting(block, s)));
        }
        rows
    }
}
