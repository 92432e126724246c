//! Document consistency report (friendly warnings)
//!
//! Purpose:
//! - Point out hand-edits that leave the order block and the shader blocks disagreeing
//! - Explain *what* looks wrong, *where*, and *what to do*
//! - Never touch the document: the engine stays lenient, this is report-only

use std::collections::{BTreeMap, BTreeSet};

use shadeset_engine::document::grammar::SHADER_PREFIX;
use shadeset_engine::ShaderView;
use shadeset_engine::{logi, logw, loge};

#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub level: IssueLevel,
    pub path: String,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueLevel {
    Warn,
    Error,
}

impl ValidationIssue {
    pub fn warn(path: impl Into<String>, message: impl Into<String>, hint: Option<String>) -> Self {
        Self { level: IssueLevel::Warn, path: path.into(), message: message.into(), hint }
    }
    pub fn error(path: impl Into<String>, message: impl Into<String>, hint: Option<String>) -> Self {
        Self { level: IssueLevel::Error, path: path.into(), message: message.into(), hint }
    }
}

pub fn emit_issues(tag: &str, issues: &[ValidationIssue]) {
    for it in issues {
        let hint = it.hint.as_deref().map(|h| format!(" (hint: {h})")).unwrap_or_default();
        match it.level {
            IssueLevel::Warn => logw!(tag, "{}: {}{hint}", it.path, it.message),
            IssueLevel::Error => loge!(tag, "{}: {}{hint}", it.path, it.message),
        }
    }
}

/// One-line summary, also when there is nothing to report.
pub fn emit_summary(tag: &str, label: &str, issues: &[ValidationIssue]) {
    let warns = issues.iter().filter(|i| i.level == IssueLevel::Warn).count();
    let errs = issues.iter().filter(|i| i.level == IssueLevel::Error).count();
    if errs == 0 && warns == 0 {
        logi!(tag, "check: {label} OK (0 issues)");
    } else {
        logw!(tag, "check: {label} issues found (errors={errs} warnings={warns})");
    }
}

/// Cross-check order list, shader blocks and whitelist line:
/// - order entries without a block
/// - blocks missing from the order
/// - identifiers listed or declared twice
/// - no whitelist line
pub fn check_view(label: &str, view: &ShaderView) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    let mut order_seen = BTreeSet::new();
    for (i, name) in view.order.iter().enumerate() {
        if !order_seen.insert(name.as_str()) {
            issues.push(ValidationIssue::warn(
                format!("{label}:order/{i}"),
                format!("'{name}' is listed twice"),
                Some("the renderer applies it twice; remove the extra line".into()),
            ));
        }
    }

    let mut declared: BTreeMap<&str, usize> = BTreeMap::new();
    for block in &view.shaders {
        *declared.entry(block.name()).or_default() += 1;
    }
    for (name, count) in &declared {
        if *count > 1 {
            issues.push(ValidationIssue::error(
                format!("{label}:{SHADER_PREFIX}{name}"),
                format!("enable directive for '{name}' appears {count} times"),
                Some("toggling only rewrites the first one; delete the duplicates".into()),
            ));
        }
    }

    for (i, name) in view.order.iter().enumerate() {
        if !declared.contains_key(name.as_str()) {
            issues.push(ValidationIssue::warn(
                format!("{label}:order/{i}"),
                format!("'{name}' has no shader block"),
                Some(format!("add a `#define {name}_ENABLED 0` block or drop it from the order")),
            ));
        }
    }

    for name in declared.keys() {
        if !order_seen.contains(name) {
            issues.push(ValidationIssue::warn(
                format!("{label}:{SHADER_PREFIX}{name}"),
                format!("'{name}' is not in the order block"),
                Some(format!("run `shadeset order ...` with {name} included")),
            ));
        }
    }

    if view.whitelist.is_none() {
        issues.push(ValidationIssue::warn(
            format!("{label}:whitelist"),
            "no whitelist line",
            Some("whitelist updates need a `// Whitelist: \"...\"` line to rewrite".into()),
        ));
    }

    issues
}
