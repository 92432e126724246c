//! View presenter
//!
//! The engine only produces a [`ShaderView`]; how it appears is decided here.
//! The table is what a person reads in a terminal, JSON is for scripts.
//!
//! Disabled shaders get their identifier + `Off` row and nothing else, which
//! mirrors what the engine exposes for them.

use serde::Serialize;
use shadeset_engine::{Profile, Row, ShaderView, Tooltip};

#[derive(Debug, Clone, Copy)]
pub enum Presenter {
    /// Aligned text rows, tooltips indented under their row.
    Table(TablePresenter),
    /// One pretty-printed JSON object.
    Json(JsonPresenter),
}

impl Presenter {
    pub fn for_flags(json: bool) -> Self {
        if json {
            Presenter::Json(JsonPresenter)
        } else {
            Presenter::Table(TablePresenter::default())
        }
    }

    pub fn view(&self, view: &ShaderView, profile: Option<&str>) -> anyhow::Result<String> {
        match self {
            Presenter::Table(p) => Ok(p.view(view, profile)),
            Presenter::Json(p) => p.view(view, profile),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TablePresenter {
    pub show_tooltips: bool,
}

impl Default for TablePresenter {
    fn default() -> Self {
        Self { show_tooltips: true }
    }
}

impl TablePresenter {
    pub fn view(&self, view: &ShaderView, profile: Option<&str>) -> String {
        let mut out = String::new();
        if let Some(p) = profile {
            out.push_str(&format!("Profile:   {p}\n"));
        }
        out.push_str(&format!("Order:     {}\n", view.order.join(", ")));
        match &view.whitelist {
            Some(w) => out.push_str(&format!("Whitelist: {w}\n")),
            None => out.push_str("Whitelist: (no whitelist line)\n"),
        }
        out.push('\n');

        let width = view
            .rows()
            .iter()
            .map(|r| match r {
                Row::Shader(b) => b.id.len(),
                Row::Setting(_, s) => s.name.len() + 2,
            })
            .max()
            .unwrap_or(0);

        for row in view.rows() {
            match row {
                Row::Shader(block) => {
                    out.push_str(&format!("{:<width$}  {}\n", block.id, block.status()));
                    if let Some(t) = block.tooltip.as_ref().filter(|_| self.show_tooltips) {
                        push_tooltip(&mut out, t, 4);
                    }
                }
                Row::Setting(_, setting) => {
                    let name = format!("  {}", setting.name);
                    out.push_str(&format!("{name:<width$}  {}\n", setting.value));
                    if let Some(t) = setting.tooltip.as_ref().filter(|_| self.show_tooltips) {
                        push_tooltip(&mut out, t, 6);
                    }
                }
            }
        }
        out
    }

    /// Enabled shaders only, one per line.
    pub fn status(&self, view: &ShaderView) -> String {
        let enabled = view.enabled_shaders();
        if enabled.is_empty() {
            return "No shaders enabled.\n".to_string();
        }
        enabled.iter().map(|n| format!("{n}\n")).collect()
    }

    pub fn profiles(&self, profiles: &[Profile], active: Option<&str>) -> String {
        profiles
            .iter()
            .map(|p| {
                let marker = if Some(p.name.as_str()) == active { '*' } else { ' ' };
                format!("{marker} {}\n", p.name)
            })
            .collect()
    }
}

fn push_tooltip(out: &mut String, tooltip: &Tooltip, indent: usize) {
    for line in tooltip.lines() {
        out.push_str(&format!("{:indent$}# {line}\n", ""));
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPresenter;

#[derive(Serialize)]
struct ViewJson<'a> {
    profile: Option<&'a str>,
    #[serde(flatten)]
    view: &'a ShaderView,
}

impl JsonPresenter {
    pub fn view(&self, view: &ShaderView, profile: Option<&str>) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(&ViewJson { profile, view })?)
    }
}
