//! Targeted rewrites of the raw document.
//!
//! Every operation is a list of [`Rule`]s tried in order. The first rule whose
//! pattern matches replaces exactly that one region; all other bytes are kept.
//! When nothing matches the document comes back unchanged, which callers treat
//! as a no-op.

use regex::{Captures, Regex};

use super::grammar::{
    ENABLED_SUFFIX, ORDER_FOOTER, ORDER_HEADER, ORDER_SENTINEL, SHADER_PREFIX, WHITELIST_LABEL,
};
use super::value::{self, ValueKind};
use super::SettingsDocument;
use crate::error::EngineError;

type Formatter = Box<dyn Fn(&Captures<'_>) -> String>;

/// A region pattern and the text that replaces it.
pub struct Rule {
    pattern: Regex,
    format: Formatter,
}

impl Rule {
    fn new(pattern: &str, format: impl Fn(&Captures<'_>) -> String + 'static) -> Self {
        Self {
            // Patterns are built from escaped names, so they always compile.
            pattern: Regex::new(pattern).expect("mutation pattern"),
            format: Box::new(format),
        }
    }

    /// Replace the first match, or `None` if the pattern does not occur.
    pub fn apply(&self, text: &str) -> Option<String> {
        let caps = self.pattern.captures(text)?;
        let whole = caps.get(0)?;
        let replacement = (self.format)(&caps);

        let mut out = String::with_capacity(text.len() + replacement.len());
        out.push_str(&text[..whole.start()]);
        out.push_str(&replacement);
        out.push_str(&text[whole.end()..]);
        Some(out)
    }
}

/// Run the first matching rule against the document.
pub fn rewrite(doc: &SettingsDocument, rules: &[Rule]) -> SettingsDocument {
    rules
        .iter()
        .find_map(|rule| rule.apply(doc.as_str()))
        .map(SettingsDocument::new)
        .unwrap_or_else(|| doc.clone())
}

fn indent(caps: &Captures<'_>) -> String {
    caps.get(1).map(|m| m.as_str()).unwrap_or("").to_string()
}

/// Rules flipping `#define <NAME>_ENABLED <digit>`.
pub fn toggle_rules(shader_id: &str, currently_enabled: bool) -> Vec<Rule> {
    let Some(name) = shader_id.strip_prefix(SHADER_PREFIX) else {
        return Vec::new();
    };
    let directive = format!("{name}{ENABLED_SUFFIX}");
    let digit = if currently_enabled { "0" } else { "1" };
    let pattern = format!(r"(?m)^([ \t]*)#define[ \t]+{}[ \t]+\d+", regex::escape(&directive));
    vec![Rule::new(&pattern, move |caps| {
        format!("{}#define {directive} {digit}", indent(caps))
    })]
}

/// Flip a shader's enable directive. Unknown identifiers leave the document as-is.
pub fn toggle_shader(doc: &SettingsDocument, shader_id: &str, currently_enabled: bool) -> SettingsDocument {
    rewrite(doc, &toggle_rules(shader_id, currently_enabled))
}

/// Rules rewriting one setting declaration with an already validated value.
pub fn setting_rules(name: &str, value: &str, kind: ValueKind) -> Vec<Rule> {
    let escaped = regex::escape(name);
    let (name, value) = (name.to_string(), value.to_string());

    match kind.glsl_type() {
        None => {
            let (define_name, define_value) = (name.clone(), value.clone());
            vec![
                Rule::new(&format!(r"(?m)^([ \t]*)#define[ \t]+{escaped}[ \t]+\S+"), move |caps| {
                    format!("{}#define {define_name} {define_value}", indent(caps))
                }),
                Rule::new(
                    &format!(r"(?m)^([ \t]*)uniform\s+(float|double|int|uint)\s+{escaped}\s*=[^;\n]+;"),
                    move |caps| format!("{}uniform {} {name} = {value};", indent(caps), &caps[2]),
                ),
            ]
        }
        Some(ty) => vec![Rule::new(
            &format!(r"(?m)^([ \t]*)uniform\s+{ty}\s+{escaped}\s*=[^;\n]+;"),
            move |caps| format!("{}uniform {ty} {name} = {value};", indent(caps)),
        )],
    }
}

/// Validate `raw` and write it into the declaration of `name`.
///
/// Enable directives are not settings and are left alone.
pub fn edit_setting(doc: &SettingsDocument, name: &str, raw: &str) -> Result<SettingsDocument, EngineError> {
    let (value, kind) = value::validate(raw).ok_or_else(|| EngineError::InvalidValue {
        name: name.to_string(),
        value: raw.to_string(),
    })?;
    if name.ends_with(ENABLED_SUFFIX) {
        return Ok(doc.clone());
    }
    Ok(rewrite(doc, &setting_rules(name, value, kind)))
}

/// Full order block text for the given shader names.
pub fn order_block(order: &[impl AsRef<str>]) -> String {
    let mut block = String::from(ORDER_HEADER);
    block.push_str("\n\n");
    for name in order {
        let name = name.as_ref();
        let name = name.strip_prefix(SHADER_PREFIX).unwrap_or(name);
        block.push_str("    ");
        block.push_str(SHADER_PREFIX);
        block.push_str(name);
        block.push_str(",\n");
    }
    block.push('\n');
    block.push_str(ORDER_FOOTER);
    block
}

pub fn order_rules(order: &[impl AsRef<str>]) -> Vec<Rule> {
    if order.is_empty() {
        return Vec::new();
    }
    let block = order_block(order);
    // A bare sentinel line stays bare; the region never reaches past it.
    let bare = format!("{}{ORDER_SENTINEL}", &block[..block.len() - ORDER_FOOTER.len()]);
    vec![Rule::new(r"(?ms)^const\s+int\s+SHADER_ORDER.+?^SHADERS\);([ \t]*//)?", move |caps| {
        if caps.get(1).is_some() {
            block.clone()
        } else {
            bare.clone()
        }
    })]
}

/// Replace the order block with one regenerated from `order`.
pub fn reorder(doc: &SettingsDocument, order: &[impl AsRef<str>]) -> SettingsDocument {
    rewrite(doc, &order_rules(order))
}

/// Collapse line breaks and tabs to spaces and drop quotes, which would end
/// the quoted directive early.
pub fn normalize_list(text: &str) -> String {
    text.replace("\r\n", " ")
        .chars()
        .filter(|c| *c != '"')
        .map(|c| if matches!(c, '\n' | '\r' | '\t') { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

pub fn whitelist_rules(normalized: &str) -> Vec<Rule> {
    let normalized = normalized.to_string();
    let pattern = format!(r#"(?m)^([ \t]*)//[ \t]*{}[ \t]*"[^"\n]*""#, regex::escape(WHITELIST_LABEL));
    vec![Rule::new(&pattern, move |caps| {
        format!("{}// {WHITELIST_LABEL} \"{normalized}\"", indent(caps))
    })]
}

/// Rewrite the whitelist line. Returns the new document and the normalized text.
pub fn update_whitelist(doc: &SettingsDocument, text: &str) -> (SettingsDocument, String) {
    let normalized = normalize_list(text);
    let doc = rewrite(doc, &whitelist_rules(&normalized));
    (doc, normalized)
}
