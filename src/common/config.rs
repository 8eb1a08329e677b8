use std::path::{Path, PathBuf};

use anyhow::bail;
use serde::{Deserialize, Serialize};

use super::collections::{BTreeMap, HashMap, HashSet};
use crate::layout_engine::{Direction, LayoutCommand, Orientation};

const MAX_WORKSPACES: usize = 32;

pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
        .unwrap_or_default()
        .join("tilecore")
}

pub fn config_file() -> PathBuf { config_dir().join("config.toml") }

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub layout: LayoutSettings,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct LayoutSettings {
    /// Axis used when a new window splits the focused one.
    #[serde(default = "default_orientation")]
    pub default_orientation: Orientation,
    /// Smallest share of a split any child can be resized down to.
    #[serde(default = "default_min_ratio")]
    pub min_ratio: f64,
    /// Ratio change applied by bindings that grow or shrink a window.
    #[serde(default = "default_resize_step")]
    pub resize_step: f64,
    #[serde(default)]
    pub gaps: GapSettings,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            default_orientation: default_orientation(),
            min_ratio: default_min_ratio(),
            resize_step: default_resize_step(),
            gaps: GapSettings::default(),
        }
    }
}

impl LayoutSettings {
    /// Direction a newly mapped window is placed in relative to the focused
    /// one.
    pub fn new_window_direction(&self) -> Direction { self.default_orientation.forward() }

    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if !(self.min_ratio > 0.0 && self.min_ratio < 0.5) {
            issues.push(format!(
                "min_ratio must be between 0 and 0.5, got {}",
                self.min_ratio
            ));
        }

        if !(self.resize_step > 0.0 && self.resize_step < 1.0) {
            issues.push(format!(
                "resize_step must be between 0 and 1, got {}",
                self.resize_step
            ));
        }

        issues.extend(self.gaps.validate());

        issues
    }
}

/// Gap configuration for window spacing
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct GapSettings {
    /// Outer gaps (space between windows and output edges)
    #[serde(default)]
    pub outer: OuterGaps,
    /// Inner gaps (space between windows)
    #[serde(default)]
    pub inner: InnerGaps,
    /// Output-specific gap overrides keyed by output name
    #[serde(default)]
    pub per_output: BTreeMap<String, GapOverride>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct OuterGaps {
    #[serde(default)]
    pub top: i32,
    #[serde(default)]
    pub left: i32,
    #[serde(default)]
    pub bottom: i32,
    #[serde(default)]
    pub right: i32,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct InnerGaps {
    /// Gap between horizontally adjacent windows
    #[serde(default)]
    pub horizontal: i32,
    /// Gap between vertically adjacent windows
    #[serde(default)]
    pub vertical: i32,
}

/// Replaces the outer or inner gaps entirely for one output.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct GapOverride {
    #[serde(default)]
    pub outer: Option<OuterGaps>,
    #[serde(default)]
    pub inner: Option<InnerGaps>,
}

impl GapSettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        issues.extend(self.outer.validate());
        issues.extend(self.inner.validate());

        for (name, overrides) in &self.per_output {
            if let Some(outer) = &overrides.outer {
                for issue in outer.validate() {
                    issues.push(format!("per_output[{name}] {issue}"));
                }
            }
            if let Some(inner) = &overrides.inner {
                for issue in inner.validate() {
                    issues.push(format!("per_output[{name}] {issue}"));
                }
            }
        }

        issues
    }

    pub fn effective_for_output(&self, output_name: &str) -> GapSettings {
        let mut resolved = GapSettings {
            outer: self.outer.clone(),
            inner: self.inner.clone(),
            per_output: BTreeMap::new(),
        };
        if let Some(overrides) = self.per_output.get(output_name) {
            if let Some(outer) = &overrides.outer {
                resolved.outer = outer.clone();
            }
            if let Some(inner) = &overrides.inner {
                resolved.inner = inner.clone();
            }
        }
        resolved
    }
}

impl OuterGaps {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        for (edge, value) in [
            ("top", self.top),
            ("left", self.left),
            ("bottom", self.bottom),
            ("right", self.right),
        ] {
            if value < 0 {
                issues.push(format!("outer.{edge} gap must be non-negative, got {value}"));
            }
        }
        issues
    }
}

impl InnerGaps {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.horizontal < 0 {
            issues.push(format!(
                "inner.horizontal gap must be non-negative, got {}",
                self.horizontal
            ));
        }

        if self.vertical < 0 {
            issues.push(format!(
                "inner.vertical gap must be non-negative, got {}",
                self.vertical
            ));
        }

        issues
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct WorkspaceSettings {
    /// Names handed out to outputs as they appear, and valid targets for
    /// switching before they exist.
    #[serde(default = "default_workspace_names")]
    pub names: Vec<String>,
}

impl Default for WorkspaceSettings {
    fn default() -> Self {
        Self { names: default_workspace_names() }
    }
}

impl WorkspaceSettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.names.len() > MAX_WORKSPACES {
            issues.push(format!(
                "workspaces.names should not exceed {MAX_WORKSPACES} entries, got {}",
                self.names.len()
            ));
        }

        let mut seen = HashSet::default();
        for name in &self.names {
            if name.trim().is_empty() {
                issues.push("workspace names must not be empty".to_string());
            } else if !seen.insert(name.as_str()) {
                issues.push(format!("Duplicate workspace name '{name}'"));
            }
        }

        issues
    }
}

fn default_orientation() -> Orientation { Orientation::Horizontal }

fn default_min_ratio() -> f64 { 0.05 }

fn default_resize_step() -> f64 { 0.05 }

fn default_workspace_names() -> Vec<String> { (1..=4).map(|i| i.to_string()).collect() }

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    settings: Settings,
    #[serde(default)]
    workspaces: WorkspaceSettings,
    #[serde(default)]
    bindings: BTreeMap<String, LayoutCommand>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Config {
    pub settings: Settings,
    pub workspaces: WorkspaceSettings,
    /// Named commands that can be invoked by the input collaborator.
    pub bindings: HashMap<String, LayoutCommand>,
}

impl Config {
    pub fn read(path: &Path) -> anyhow::Result<Config> {
        let buf = std::fs::read_to_string(path)?;
        Self::parse(&buf)
    }

    pub fn default() -> Config {
        // The embedded file is covered by `default_config_parses`; fall back
        // to the schema defaults rather than aborting if it ever regresses.
        Self::parse(include_str!("../../tilecore.default.toml")).unwrap_or_else(|_| Config {
            settings: Settings::default(),
            workspaces: WorkspaceSettings::default(),
            bindings: HashMap::default(),
        })
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let config_file = ConfigFile {
            settings: self.settings.clone(),
            workspaces: self.workspaces.clone(),
            bindings: self.bindings.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        };

        let toml_string = toml::to_string_pretty(&config_file)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, toml_string.as_bytes())?;

        Ok(())
    }

    /// Validates the entire configuration and returns a list of issues found.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        issues.extend(self.settings.layout.validate());
        issues.extend(self.workspaces.validate());

        for name in self.bindings.keys() {
            if name.trim().is_empty() {
                issues.push("binding names must not be empty".to_string());
            }
        }

        issues
    }

    pub fn parse(buf: &str) -> anyhow::Result<Config> {
        match toml::from_str::<ConfigFile>(buf) {
            Ok(c) => Ok(Config {
                settings: c.settings,
                workspaces: c.workspaces,
                bindings: c.bindings.into_iter().collect(),
            }),
            Err(e) => {
                let msg = e.to_string();
                match Self::extract_unknown_variant(&msg).and_then(|u| Self::suggest_similar(&u)) {
                    Some(suggestion) => bail!("{msg}\nDid you mean `{suggestion}`?"),
                    None => bail!("{msg}"),
                }
            }
        }
    }

    fn levenshtein(a: &str, b: &str) -> usize {
        let a: Vec<char> = a.chars().collect();
        let b: Vec<char> = b.chars().collect();
        let mut prev: Vec<usize> = (0..=b.len()).collect();
        for i in 1..=a.len() {
            let mut row = vec![i; b.len() + 1];
            for j in 1..=b.len() {
                let cost = usize::from(a[i - 1] != b[j - 1]);
                row[j] = (prev[j] + 1).min(row[j - 1] + 1).min(prev[j - 1] + cost);
            }
            prev = row;
        }
        prev[b.len()]
    }

    /// Pulls the offending token and serde's list of expected variants out of
    /// an "unknown variant" error.
    fn extract_unknown_variant(err: &str) -> Option<(String, Vec<String>)> {
        let needle = "unknown variant `";
        let start = err.find(needle)? + needle.len();
        let end = start + err[start..].find('`')?;
        let unknown = err[start..end].to_string();

        let mut expected = Vec::new();
        let mut rest = &err[end + 1..];
        while let Some(open) = rest.find('`') {
            let after = &rest[open + 1..];
            let Some(close) = after.find('`') else { break };
            let token = &after[..close];
            if token != unknown && !expected.iter().any(|e| e == token) {
                expected.push(token.to_string());
            }
            rest = &after[close + 1..];
        }
        Some((unknown, expected))
    }

    fn suggest_similar((unknown, expected): &(String, Vec<String>)) -> Option<String> {
        let unknown = unknown.to_lowercase();
        let (best, dist) = expected
            .iter()
            .map(|cand| (cand, Self::levenshtein(&unknown, &cand.to_lowercase())))
            .min_by_key(|(_, dist)| *dist)?;
        let threshold = std::cmp::max(3usize, best.len() / 2);
        (dist <= threshold).then(|| best.clone())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn default_config_parses() {
        let cfg = Config::parse(include_str!("../../tilecore.default.toml")).unwrap();
        assert!(cfg.validate().is_empty(), "{:?}", cfg.validate());
        assert_eq!(cfg.bindings.get("reserved"), Some(&LayoutCommand::NoOp));
    }

    #[test]
    fn empty_file_uses_defaults() {
        let cfg = Config::parse("").unwrap();
        assert_eq!(cfg.settings.layout, LayoutSettings::default());
        assert_eq!(cfg.workspaces.names, vec!["1", "2", "3", "4"]);
        assert!(cfg.bindings.is_empty());
    }

    #[test]
    fn bindings_parse_in_serde_form() {
        let toml = r#"
            [settings.layout]
            default_orientation = "vertical"

            [settings.layout.gaps.outer]
            top = 8

            [bindings]
            "mod4+h" = { focus_direction = "left" }
            "mod4+shift+l" = { move_container = "right" }
            "mod4+2" = { switch_workspace = "2" }
            "mod4+space" = "toggle_float"
            "mod4+x" = "no_op"
        "#;

        let cfg = Config::parse(toml).unwrap();
        assert_eq!(cfg.settings.layout.default_orientation, Orientation::Vertical);
        assert_eq!(cfg.settings.layout.new_window_direction(), Direction::Down);
        assert_eq!(cfg.settings.layout.gaps.outer.top, 8);
        assert_eq!(
            cfg.bindings["mod4+h"],
            LayoutCommand::FocusDirection(Direction::Left)
        );
        assert_eq!(
            cfg.bindings["mod4+2"],
            LayoutCommand::SwitchWorkspace("2".to_string())
        );
        assert_eq!(cfg.bindings["mod4+x"], LayoutCommand::NoOp);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = Config::parse("[settings]\nanimate = true\n").unwrap_err();
        assert!(err.to_string().contains("animate"));
    }

    #[test]
    fn unknown_command_gets_a_suggestion() {
        let err = Config::parse("[bindings]\nx = \"toggle_flot\"\n").unwrap_err();
        assert!(err.to_string().contains("Did you mean `toggle_float`?"), "{err}");
    }

    #[test]
    fn extract_unknown_variant_collects_candidates() {
        let err = "unknown variant `no_opp`, expected one of `no_op`, `toggle_float`";
        let (unknown, expected) = Config::extract_unknown_variant(err).unwrap();
        assert_eq!(unknown, "no_opp");
        assert_eq!(expected, vec!["no_op", "toggle_float"]);
        assert_eq!(
            Config::suggest_similar(&(unknown, expected)),
            Some("no_op".to_string())
        );
    }

    #[test]
    fn levenshtein_distances() {
        assert_eq!(Config::levenshtein("kitten", "sitting"), 3);
        assert_eq!(Config::levenshtein("", "abc"), 3);
        assert_eq!(Config::levenshtein("same", "same"), 0);
    }

    #[test]
    fn validation_reports_bad_values() {
        let mut cfg = Config::parse("").unwrap();
        cfg.settings.layout.min_ratio = 0.7;
        cfg.settings.layout.gaps.outer.left = -3;
        cfg.workspaces.names = vec!["web".into(), "web".into(), " ".into()];
        let issues = cfg.validate();
        assert!(issues.iter().any(|i| i.contains("min_ratio")));
        assert!(issues.iter().any(|i| i.contains("outer.left")));
        assert!(issues.iter().any(|i| i.contains("Duplicate workspace name 'web'")));
        assert!(issues.iter().any(|i| i.contains("must not be empty")));
    }

    #[test]
    fn per_output_gaps_override() {
        let toml = r#"
            [settings.layout.gaps.inner]
            horizontal = 4
            vertical = 4

            [settings.layout.gaps.per_output.HDMI-1.inner]
            horizontal = 10
        "#;
        let cfg = Config::parse(toml).unwrap();
        let gaps = &cfg.settings.layout.gaps;
        assert_eq!(gaps.effective_for_output("eDP-1").inner.horizontal, 4);
        let hdmi = gaps.effective_for_output("HDMI-1");
        assert_eq!(hdmi.inner.horizontal, 10);
        assert_eq!(hdmi.inner.vertical, 0);
    }

    #[test]
    fn save_then_read_keeps_bindings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.bindings.insert(
            "mod4+r".to_string(),
            LayoutCommand::ResizeBy { amount: 0.1 },
        );
        cfg.save(&path).unwrap();
        assert_eq!(Config::read(&path).unwrap(), cfg);
    }
}
