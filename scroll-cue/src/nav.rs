//! Floating chapter navigation: buttons jump to fixed scroll offsets and the
//! button for the chapter in view is highlighted.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::host::Host;
use crate::selector::Selector;

const ACTIVE_CLASS: &str = "active";
const TARGET_ATTRIBUTE: &str = "data-target";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Chapter {
    pub id: String,
    pub offset: f64,
}

fn default_buttons() -> Selector {
    Selector::class("nav-button")
}

fn default_lead() -> f64 {
    200.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NavSpec {
    #[serde(default = "default_buttons")]
    pub buttons: Selector,
    pub chapters: Vec<Chapter>,
    /// A chapter counts as current this many pixels before its offset.
    #[serde(default = "default_lead")]
    pub lead_px: f64,
}

#[derive(Debug)]
pub struct ChapterNav<N> {
    chapters: Vec<Chapter>,
    lead_px: f64,
    buttons: Vec<(N, Option<String>)>,
    active: Option<String>,
}

impl<N: Clone + PartialEq + fmt::Debug> ChapterNav<N> {
    pub fn mount<H: Host<Node = N>>(host: &mut H, spec: &NavSpec) -> Self {
        let mut chapters = spec.chapters.clone();
        chapters.sort_by(|a, b| a.offset.total_cmp(&b.offset));

        let buttons: Vec<_> = host
            .query_all(&spec.buttons)
            .into_iter()
            .map(|node| {
                let target = host.attribute(&node, TARGET_ATTRIBUTE);
                (node, target)
            })
            .collect();
        info!(buttons = buttons.len(), chapters = chapters.len(), "chapter navigation ready");

        let mut nav = Self {
            chapters,
            lead_px: spec.lead_px,
            buttons,
            active: None,
        };
        if let Some(first) = nav.chapters.first().map(|c| c.id.clone()) {
            nav.set_active(host, &first);
        }
        nav
    }

    /// The chapter in view at `offset`: the furthest one whose offset minus
    /// the lead has been reached, else the first.
    pub fn active_for(&self, offset: f64) -> Option<&Chapter> {
        self.chapters
            .iter()
            .rev()
            .find(|c| offset >= c.offset - self.lead_px)
            .or_else(|| self.chapters.first())
    }

    pub fn offset_of(&self, id: &str) -> Option<f64> {
        self.chapters.iter().find(|c| c.id == id).map(|c| c.offset)
    }

    /// Returns true when the click landed on a navigation button.
    pub fn on_click<H: Host<Node = N>>(&mut self, host: &mut H, target: &N) -> bool {
        let hit = self.buttons.iter().find(|(node, _)| host.contains(node, target));
        let Some((_, chapter)) = hit else {
            return false;
        };
        let Some(id) = chapter.clone() else {
            return true;
        };
        match self.offset_of(&id) {
            Some(offset) => {
                debug!(chapter = %id, offset, "jumping to chapter");
                host.scroll_to(offset, true);
                self.set_active(host, &id);
            }
            None => debug!(chapter = %id, "navigation target has no chapter"),
        }
        true
    }

    pub fn on_scroll<H: Host<Node = N>>(&mut self, host: &mut H) {
        let offset = host.scroll_offset();
        if let Some(id) = self.active_for(offset).map(|c| c.id.clone()) {
            self.set_active(host, &id);
        }
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    fn set_active<H: Host<Node = N>>(&mut self, host: &mut H, id: &str) {
        if self.active.as_deref() == Some(id) {
            return;
        }
        for (node, target) in &self.buttons {
            host.set_class(node, ACTIVE_CLASS, target.as_deref() == Some(id));
        }
        self.active = Some(id.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimElement, SimEvent, SimHost};

    fn spec() -> NavSpec {
        NavSpec {
            buttons: default_buttons(),
            chapters: vec![
                Chapter { id: "chapter1".into(), offset: 0.0 },
                Chapter { id: "chapter2".into(), offset: 5200.0 },
                Chapter { id: "chapter3".into(), offset: 8280.0 },
                Chapter { id: "chapter4".into(), offset: 9800.0 },
            ],
            lead_px: default_lead(),
        }
    }

    fn host() -> SimHost {
        let mut host = SimHost::new();
        for i in 1..=4 {
            let button = host.add(
                SimElement::new()
                    .class("nav-button")
                    .attr("data-target", &format!("chapter{i}")),
            );
            host.add(SimElement::new().class("nav-label").child_of(button));
        }
        host
    }

    #[test]
    fn active_chapter_leads_offsets() {
        let mut host = host();
        let nav = ChapterNav::mount(&mut host, &spec());
        let id = |o: f64| nav.active_for(o).map(|c| c.id.as_str());
        assert_eq!(id(0.0), Some("chapter1"));
        assert_eq!(id(4999.0), Some("chapter1"));
        assert_eq!(id(5000.0), Some("chapter2"));
        assert_eq!(id(8080.0), Some("chapter3"));
        assert_eq!(id(20000.0), Some("chapter4"));
    }

    #[test]
    fn mount_highlights_first_chapter() {
        let mut host = host();
        let nav = ChapterNav::mount(&mut host, &spec());
        assert_eq!(nav.active(), Some("chapter1"));
        assert!(host.element(0).has_class("active"));
        assert!(!host.element(2).has_class("active"));
    }

    #[test]
    fn click_on_button_child_scrolls_smoothly() {
        let mut host = host();
        let mut nav = ChapterNav::mount(&mut host, &spec());
        assert!(nav.on_click(&mut host, &5));
        assert_eq!(nav.active(), Some("chapter3"));
        assert!(host.log().contains(&SimEvent::ScrollTo { offset: 8280.0, smooth: true }));
        assert!(host.element(4).has_class("active"));
        assert!(!host.element(0).has_class("active"));
    }

    #[test]
    fn scroll_updates_active_button() {
        let mut host = host();
        let mut nav = ChapterNav::mount(&mut host, &spec());
        host.set_scroll(9700.0);
        nav.on_scroll(&mut host);
        assert_eq!(nav.active(), Some("chapter4"));
        assert!(host.element(6).has_class("active"));
    }

    #[test]
    fn unknown_target_is_ignored() {
        let mut host = host();
        let stray = host.add(SimElement::new().class("nav-button").attr("data-target", "epilogue"));
        let mut nav = ChapterNav::mount(&mut host, &spec());
        assert!(nav.on_click(&mut host, &stray));
        assert_eq!(nav.active(), Some("chapter1"));
        assert!(!host.log().iter().any(|e| matches!(e, SimEvent::ScrollTo { .. })));
    }
}
