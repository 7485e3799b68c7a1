//! Threshold registry: the ordered list of reveal rules authored at startup.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CueError, Result};
use crate::host::DisplayStyle;
use crate::selector::Selector;

/// Position of a rule in its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(pub usize);

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RuleOptions {
    /// Style applied while visible.
    #[serde(default)]
    pub display: DisplayStyle,
    /// Quiet period after the last scroll event before re-evaluating.
    #[serde(default)]
    pub debounce_ms: u64,
}

/// One group of elements that appears once the page is scrolled far enough.
#[derive(Debug, Clone, PartialEq)]
pub struct RevealRule {
    pub id: RuleId,
    pub selector: Selector,
    pub scroll_threshold: f64,
    pub audio: Option<Selector>,
    pub display: DisplayStyle,
    pub debounce: Duration,
}

impl RevealRule {
    pub fn should_show(&self, scroll_offset: f64) -> bool {
        scroll_offset >= self.scroll_threshold
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Registry {
    rules: Vec<RevealRule>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule. The threshold must be finite and non-negative.
    pub fn register(
        &mut self,
        selector: Selector,
        scroll_threshold: f64,
        audio: Option<Selector>,
        options: RuleOptions,
    ) -> Result<&RevealRule> {
        if !scroll_threshold.is_finite() || scroll_threshold < 0.0 {
            return Err(CueError::invalid_threshold(&selector.to_string(), scroll_threshold));
        }
        let id = RuleId(self.rules.len());
        self.rules.push(RevealRule {
            id,
            selector,
            scroll_threshold,
            audio,
            display: options.display,
            debounce: Duration::from_millis(options.debounce_ms),
        });
        Ok(&self.rules[id.0])
    }

    pub fn rules(&self) -> &[RevealRule] {
        &self.rules
    }

    pub fn get(&self, id: RuleId) -> Option<&RevealRule> {
        self.rules.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Audio selectors referenced by any rule, first mention order, deduplicated.
    pub fn audio_selectors(&self) -> Vec<Selector> {
        let mut seen = HashSet::new();
        self.rules
            .iter()
            .filter_map(|r| r.audio.clone())
            .filter(|s| seen.insert(s.clone()))
            .collect()
    }

    /// Authoring warnings. None of these stop a story from running.
    pub fn lint(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let mut seen = HashSet::new();
        let mut highest: Option<&RevealRule> = None;

        for rule in &self.rules {
            if !seen.insert(&rule.selector) {
                warnings.push(format!(
                    "selector '{}' is registered more than once",
                    rule.selector
                ));
            }
            match highest {
                Some(prev) if rule.scroll_threshold < prev.scroll_threshold => {
                    warnings.push(format!(
                        "'{}' at {}px is registered after '{}' at {}px",
                        rule.selector, rule.scroll_threshold, prev.selector, prev.scroll_threshold
                    ));
                }
                _ => highest = Some(rule),
            }
        }
        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sel(s: &str) -> Selector {
        Selector::parse(s).unwrap()
    }

    #[test]
    fn register_assigns_ids_in_order() {
        let mut reg = Registry::new();
        reg.register(sel("one-content"), 20.0, None, RuleOptions::default()).unwrap();
        let rule = reg
            .register(sel("group-1"), 300.0, Some(sel("audio-1")), RuleOptions::default())
            .unwrap();
        assert_eq!(rule.id, RuleId(1));
        assert_eq!(rule.display.as_str(), "block");
        assert_eq!(rule.debounce, Duration::ZERO);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn rejects_negative_and_non_finite_thresholds() {
        let mut reg = Registry::new();
        assert!(reg.register(sel("a"), -1.0, None, RuleOptions::default()).is_err());
        assert!(reg.register(sel("a"), f64::NAN, None, RuleOptions::default()).is_err());
        assert!(reg.register(sel("a"), f64::INFINITY, None, RuleOptions::default()).is_err());
        assert!(reg.is_empty());
        assert!(reg.register(sel("a"), 0.0, None, RuleOptions::default()).is_ok());
    }

    #[test]
    fn should_show_is_inclusive() {
        let mut reg = Registry::new();
        let rule = reg.register(sel("five-img"), 2100.0, None, RuleOptions::default()).unwrap();
        assert!(!rule.should_show(2099.0));
        assert!(rule.should_show(2100.0));
        assert!(rule.should_show(9000.0));
    }

    #[test]
    fn audio_selectors_are_deduplicated() {
        let mut reg = Registry::new();
        reg.register(sel("a"), 0.0, Some(sel("audio-1")), RuleOptions::default()).unwrap();
        reg.register(sel("b"), 10.0, Some(sel("audio-2")), RuleOptions::default()).unwrap();
        reg.register(sel("c"), 20.0, Some(sel("audio-1")), RuleOptions::default()).unwrap();
        assert_eq!(reg.audio_selectors(), vec![sel("audio-1"), sel("audio-2")]);
    }

    #[test]
    fn lint_flags_out_of_order_and_duplicates() {
        let mut reg = Registry::new();
        reg.register(sel("a"), 500.0, None, RuleOptions::default()).unwrap();
        reg.register(sel("b"), 300.0, None, RuleOptions::default()).unwrap();
        reg.register(sel("a"), 600.0, None, RuleOptions::default()).unwrap();
        let warnings = reg.lint();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("'.b' at 300px"));
        assert!(warnings[1].contains("more than once"));
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let opts: RuleOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(opts, RuleOptions::default());
        let opts: RuleOptions =
            serde_json::from_str(r#"{"display":"flex","debounce_ms":50}"#).unwrap();
        assert_eq!(opts.display.as_str(), "flex");
        assert_eq!(opts.debounce_ms, 50);
    }
}
