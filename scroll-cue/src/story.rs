//! Story files: the JSON document that configures a page.
//!
//! A story lists the reveal rules in authoring order plus the optional
//! features a page may use. Every selector in it is validated on load.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::audio::AudioTrack;
use crate::error::{CueError, Result};
use crate::host::DisplayStyle;
use crate::modal::ModalSpec;
use crate::nav::NavSpec;
use crate::registry::{Registry, RuleOptions};
use crate::selector::Selector;
use crate::trigger::TriggerSpec;
use crate::video::{ShortcutSpec, VideoSpec};
use crate::viewer::ViewerSpec;
use crate::visibility::CuePolicy;

const NARRATIVE: &str = include_str!("../stories/narrative.json");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSpec {
    pub selector: Selector,
    pub threshold: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<Selector>,
    #[serde(default)]
    pub display: DisplayStyle,
    #[serde(default)]
    pub debounce_ms: u64,
}

impl RuleSpec {
    pub fn options(&self) -> RuleOptions {
        RuleOptions {
            display: self.display.clone(),
            debounce_ms: self.debounce_ms,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Story {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub cue_policy: CuePolicy,
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
    /// Explicit audio groups. Tracks referenced only by rules join `music`.
    #[serde(default)]
    pub audio: Vec<AudioTrack>,
    #[serde(default)]
    pub triggers: Vec<TriggerSpec>,
    #[serde(default)]
    pub videos: Vec<VideoSpec>,
    #[serde(default)]
    pub shortcuts: Vec<ShortcutSpec>,
    #[serde(default)]
    pub modals: Vec<ModalSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewer: Option<ViewerSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub navigation: Option<NavSpec>,
    /// Page positions for the simulated page, keyed by selector.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub page_offsets: BTreeMap<String, f64>,
}

impl Story {
    /// Parse and validate a story document.
    pub fn from_json(source: &str) -> Result<Self> {
        let story: Story = serde_json::from_str(source).map_err(|e| CueError::story(&e))?;
        story.validate()?;
        Ok(story)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| CueError::io(path, &e))?;
        Self::from_json(&source)
    }

    /// The built-in story for the narrative page.
    pub fn narrative() -> Result<Self> {
        Self::from_json(NARRATIVE)
    }

    pub fn to_json(&self, pretty: bool) -> Result<String> {
        let out = if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        };
        out.map_err(|e| CueError::story(&e))
    }

    pub fn registry(&self) -> Result<Registry> {
        let mut registry = Registry::new();
        for rule in &self.rules {
            registry.register(
                rule.selector.clone(),
                rule.threshold,
                rule.audio.clone(),
                rule.options(),
            )?;
        }
        Ok(registry)
    }

    /// Hard errors: anything that would make the story ambiguous.
    pub fn validate(&self) -> Result<()> {
        self.registry()?;

        for trigger in &self.triggers {
            check_fraction(&trigger.name, trigger.threshold)?;
            if !trigger.root_margin_px.is_finite() {
                return Err(CueError::message(&format!(
                    "trigger '{}' has a non-finite root margin",
                    trigger.name
                )));
            }
        }
        for video in &self.videos {
            check_fraction(&video.target.to_string(), video.threshold)?;
        }

        unique("trigger", self.triggers.iter().map(|t| t.name.as_str()))?;
        unique("shortcut", self.shortcuts.iter().map(|s| s.name.as_str()))?;
        unique("modal", self.modals.iter().map(|m| m.name.as_str()))?;

        if let Some(nav) = &self.navigation {
            unique("chapter", nav.chapters.iter().map(|c| c.id.as_str()))?;
            for chapter in &nav.chapters {
                if !chapter.offset.is_finite() || chapter.offset < 0.0 {
                    return Err(CueError::invalid_threshold(&chapter.id, chapter.offset));
                }
            }
        }

        for key in self.page_offsets.keys() {
            Selector::parse(key)?;
        }
        Ok(())
    }

    /// Authoring warnings; none of them stop the story from running.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = match self.registry() {
            Ok(registry) => registry.lint(),
            Err(e) => return vec![e.to_string()],
        };

        let mut seen = HashSet::new();
        for track in &self.audio {
            if !seen.insert(&track.selector) {
                warnings.push(format!(
                    "audio track '{}' is declared more than once",
                    track.selector
                ));
            }
        }
        for modal in &self.modals {
            if modal.opener.is_none() {
                warnings.push(format!("modal '{}' has no opener", modal.name));
            }
        }
        if let Some(nav) = &self.navigation {
            if nav.chapters.windows(2).any(|w| w[1].offset < w[0].offset) {
                warnings.push("chapters are not listed in scroll order".to_string());
            }
        }
        warnings
    }
}

fn check_fraction(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(CueError::invalid_fraction(name, value))
    }
}

fn unique<'a>(what: &'static str, names: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(CueError::duplicate(what, name));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn narrative_parses() {
        let story = Story::narrative().unwrap();
        let registry = story.registry().unwrap();
        assert!(registry.len() > 40);
        assert_eq!(registry.rules()[0].selector.to_string(), ".one-content");
        assert_eq!(registry.rules()[0].scroll_threshold, 20.0);
        assert_eq!(story.triggers.len(), 2);
        assert_eq!(story.navigation.as_ref().unwrap().chapters.len(), 4);
    }

    #[test]
    fn narrative_registers_turning_pages_audio() {
        let registry = Story::narrative().unwrap().registry().unwrap();
        let audio: Vec<_> = registry.audio_selectors().iter().map(|s| s.to_string()).collect();
        assert_eq!(
            audio,
            vec![".audio-1", ".audio-2", ".audio-3", ".audio-4", ".turning-pages-audio"]
        );
    }

    #[test]
    fn rule_options_inline() {
        let story = Story::from_json(
            r#"{ "rules": [
                { "selector": "group-1", "threshold": 300, "display": "flex", "debounce_ms": 80 }
            ] }"#,
        )
        .unwrap();
        let binding = story.registry().unwrap();
        let rule = &binding.rules()[0];
        assert_eq!(rule.display.as_str(), "flex");
        assert_eq!(rule.debounce.as_millis(), 80);
        assert_eq!(rule.audio, None);
    }

    #[test]
    fn unknown_top_level_field_rejected() {
        let err = Story::from_json(r#"{ "rulez": [] }"#).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Story(_)));
    }

    #[test]
    fn misspelled_nested_fields_rejected() {
        for source in [
            r#"{ "rules": [ { "selector": "group-1", "threshold": 300, "audoi": "audio-1" } ] }"#,
            r#"{ "triggers": [ { "name": "door", "target": "a", "cue": "b", "treshold": 0.5 } ] }"#,
            r##"{ "modals": [ { "name": "m", "overlay": "#m", "openr": "x" } ] }"##,
            r#"{ "videos": [ { "target": "v", "threshold": 0.5, "muted": true } ] }"#,
            r#"{ "audio": [ { "selector": "a", "groop": "fx" } ] }"#,
        ] {
            let err = Story::from_json(source).unwrap_err();
            assert!(matches!(err.kind, ErrorKind::Story(_)), "{source}");
            assert!(err.to_string().contains("unknown field"), "{err}");
        }
    }

    #[test]
    fn bad_selector_rejected() {
        let err = Story::from_json(r#"{ "rules": [ { "selector": ".a > .b", "threshold": 1 } ] }"#)
            .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Story(_)));
    }

    #[test]
    fn negative_threshold_rejected() {
        let source = r#"{ "rules": [ { "selector": "a", "threshold": -5 } ] }"#;
        let err = Story::from_json(source).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::InvalidThreshold { .. }));
    }

    #[test]
    fn trigger_fraction_checked() {
        let err = Story::from_json(
            r#"{ "triggers": [
                { "name": "door", "target": "five-img", "cue": "audio-3", "threshold": 1.5 }
            ] }"#,
        )
        .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::InvalidFraction { .. }));
    }

    #[test]
    fn duplicate_modal_names_rejected() {
        let err = Story::from_json(
            r##"{ "modals": [
                { "name": "m", "overlay": "#a" },
                { "name": "m", "overlay": "#b" }
            ] }"##,
        )
        .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Duplicate { what: "modal", .. }));
    }

    #[test]
    fn warnings_cover_order_and_missing_opener() {
        let story = Story::from_json(
            r##"{
                "rules": [
                    { "selector": "a", "threshold": 500 },
                    { "selector": "b", "threshold": 100 }
                ],
                "modals": [ { "name": "m", "overlay": "#m" } ]
            }"##,
        )
        .unwrap();
        let warnings = story.warnings();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[1].contains("no opener"));
    }

    #[test]
    fn json_survives_dump() {
        let story = Story::narrative().unwrap();
        let again = Story::from_json(&story.to_json(false).unwrap()).unwrap();
        assert_eq!(story, again);
    }
}
