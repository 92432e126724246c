//! Single forward pass over the document lines.
//!
//! Three independent scanners run per line:
//! - order collection, until the order sentinel is seen;
//! - whitelist detection, until the first whitelist line is seen;
//! - the block scanner, a two-state machine ([`BlockState`]) that alternates
//!   between seeking an enable directive and reading a block body.
//!
//! Unrecognized lines are inert. Nothing here fails: a malformed document just
//! yields a smaller view.

use std::sync::LazyLock;

use regex::Regex;

use super::grammar::{
    BLOCK_END, BLOCK_TOOLTIP_LABELS, ORDER_SENTINEL, SHADER_PREFIX, WHITELIST_LABEL,
};
use super::{Setting, ShaderBlock, ShaderView, Tooltip, ValueKind};

const DESCRIPTION_LABEL: &str = BLOCK_TOOLTIP_LABELS[0];

static ENABLED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#define\s+([A-Z0-9_]+)_ENABLED\s+(\d)").expect("enable directive pattern")
});

static DEFINE_SETTING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#define\s+([A-Z0-9_]+)\s+(\S+)").expect("define setting pattern")
});

static UNIFORM_SETTING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^uniform\s+(\S+)\s+([A-Z0-9_]+)\s*=\s*(.+?);\s*$").expect("uniform setting pattern")
});

static WHITELIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r#"^//\s*{}\s*"([^"]*)""#, regex::escape(WHITELIST_LABEL)))
        .expect("whitelist pattern")
});

/// Where the block scanner is.
#[derive(Debug)]
enum BlockState {
    /// Between blocks; collecting the next block's tooltip.
    Seeking { tooltip: Tooltip },
    /// Inside block `index`; collecting the next setting's tooltip.
    InBlock { index: usize, enabled: bool, tooltip: Tooltip },
}

impl Default for BlockState {
    fn default() -> Self {
        BlockState::Seeking { tooltip: Tooltip::default() }
    }
}

impl BlockState {
    fn step(self, line: &str, shaders: &mut Vec<ShaderBlock>) -> BlockState {
        match self {
            BlockState::Seeking { tooltip } => seek_block(tooltip, line, shaders),
            BlockState::InBlock { index, enabled, tooltip } => {
                read_block_line(index, enabled, tooltip, line, shaders)
            }
        }
    }
}

fn seek_block(mut tooltip: Tooltip, line: &str, shaders: &mut Vec<ShaderBlock>) -> BlockState {
    if let Some(text) = block_tooltip_line(line) {
        // A new description starts a new region; anything pending belonged to
        // a block that never opened.
        if text.starts_with(DESCRIPTION_LABEL) {
            tooltip = Tooltip::default();
        }
        tooltip.push(text);
        return BlockState::Seeking { tooltip };
    }

    let Some(caps) = ENABLED.captures(line) else {
        return BlockState::Seeking { tooltip };
    };

    let enabled = &caps[2] == "1";
    shaders.push(ShaderBlock {
        id: format!("{SHADER_PREFIX}{}", &caps[1]),
        enabled,
        settings: Vec::new(),
        tooltip: tooltip.take(),
    });
    BlockState::InBlock { index: shaders.len() - 1, enabled, tooltip: Tooltip::default() }
}

fn read_block_line(
    index: usize,
    enabled: bool,
    mut tooltip: Tooltip,
    line: &str,
    shaders: &mut [ShaderBlock],
) -> BlockState {
    if line.starts_with(BLOCK_END) {
        return BlockState::default();
    }
    if !enabled {
        return BlockState::InBlock { index, enabled, tooltip };
    }

    if let Some(comment) = line.strip_prefix("//") {
        tooltip.push(comment.trim());
        return BlockState::InBlock { index, enabled, tooltip };
    }

    let setting = if line.starts_with("#define") {
        DEFINE_SETTING.captures(line).map(|caps| Setting {
            name: caps[1].to_string(),
            value: caps[2].to_string(),
            kind: ValueKind::Scalar,
            uniform_type: None,
            tooltip: None,
        })
    } else if line.starts_with("uniform") {
        UNIFORM_SETTING.captures(line).map(|caps| Setting {
            name: caps[2].to_string(),
            value: caps[3].to_string(),
            kind: ValueKind::from_uniform_type(&caps[1]),
            uniform_type: Some(caps[1].to_string()),
            tooltip: None,
        })
    } else {
        return BlockState::InBlock { index, enabled, tooltip };
    };

    // Declaration lines consume the pending tooltip whether or not they matched.
    let pending = tooltip.take();
    if let Some(mut setting) = setting {
        setting.tooltip = pending;
        shaders[index].settings.push(setting);
    }
    BlockState::InBlock { index, enabled, tooltip }
}

/// `// Description: ...` style comment, returned without the comment marker.
fn block_tooltip_line(line: &str) -> Option<&str> {
    let text = line.strip_prefix("//")?.trim();
    BLOCK_TOOLTIP_LABELS
        .iter()
        .any(|label| text.starts_with(label))
        .then_some(text)
}

/// Order entry `SHADER_FOO,` → `FOO`.
fn order_entry(line: &str) -> Option<&str> {
    let name = line.strip_prefix(SHADER_PREFIX)?;
    let name = name.strip_suffix(',').unwrap_or(name).trim_end();
    (!name.is_empty()).then_some(name)
}

/// Derive the structured view from a text buffer.
pub fn parse(text: &str) -> ShaderView {
    let mut view = ShaderView::default();
    let mut order_done = false;
    let mut state = BlockState::default();

    for raw in text.lines() {
        let line = raw.trim();

        if !order_done {
            if line.starts_with(ORDER_SENTINEL) {
                order_done = true;
                continue;
            }
            if let Some(name) = order_entry(line) {
                view.order.push(name.to_string());
                continue;
            }
        }

        if view.whitelist.is_none() {
            if let Some(caps) = WHITELIST.captures(line) {
                view.whitelist = Some(caps[1].to_string());
                continue;
            }
        }

        state = state.step(line, &mut view.shaders);
    }

    view
}
