//! The host collaborator: everything the engine needs from a page.
//!
//! The engine never touches a DOM directly. A browser build implements
//! [`Host`] over `web-sys` (see `web`), tests and the CLI use the in-memory
//! [`crate::sim::SimHost`].

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::registry::RuleId;
use crate::selector::Selector;

/// Value written to an element's `display` style.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DisplayStyle(String);

impl DisplayStyle {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The hidden state is always `none`.
    pub fn hidden() -> Self {
        Self("none".to_string())
    }

    pub fn is_hidden(&self) -> bool {
        self.0 == "none"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DisplayStyle {
    fn default() -> Self {
        Self("block".to_string())
    }
}

impl fmt::Display for DisplayStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Viewport-relative bounding box, as `getBoundingClientRect()` reports it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// Any overlap with a viewport of the given height.
    pub fn overlaps_viewport(&self, viewport_height: f64) -> bool {
        self.top < viewport_height && self.bottom() > 0.0
    }
}

/// Identifies what a timer was armed for; handed back to `Stage::timer_fired`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKey {
    Reveal(RuleId),
}

/// Host-issued timer id, used only to cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(pub u64);

/// Identifies an intersection watcher; handed back to `Stage::intersection`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObserverKey {
    Trigger(usize),
    Video(usize),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObserverSpec {
    /// Visible fraction at which the host reports a crossing.
    pub threshold: f64,
    /// Margin grown around the viewport before intersecting, in pixels.
    pub root_margin_px: f64,
}

/// One observation delivered by an intersection watcher.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntersectionEntry {
    pub ratio: f64,
    pub is_intersecting: bool,
}

/// Reason a host refused or failed to start playback (autoplay policy, decode error...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackError(pub String);

impl fmt::Display for PlaybackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Context attached to every play request.
///
/// Playback is asynchronous. When the host learns the request was rejected
/// it calls [`PlayCue::rejected`] and opens the returned URL, if any, in a
/// new browsing context. Rejections are never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayCue {
    pub label: String,
    pub fallback_url: Option<String>,
}

impl PlayCue {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            fallback_url: None,
        }
    }

    pub fn with_fallback(mut self, url: impl Into<String>) -> Self {
        self.fallback_url = Some(url.into());
        self
    }

    pub fn rejected(&self, err: &PlaybackError) -> Option<&str> {
        match &self.fallback_url {
            Some(url) => {
                warn!(
                    cue = %self.label,
                    error = %err,
                    fallback = %url,
                    "playback rejected, opening fallback"
                );
                Some(url)
            }
            None => {
                warn!(cue = %self.label, error = %err, "playback rejected");
                None
            }
        }
    }
}

/// Page, media, viewport, timer and observer services.
pub trait Host {
    type Node: Clone + PartialEq + fmt::Debug;

    // ── Document ───────────────────────────────────────────────────────
    fn query_all(&self, selector: &Selector) -> Vec<Self::Node>;

    fn query(&self, selector: &Selector) -> Option<Self::Node> {
        self.query_all(selector).into_iter().next()
    }

    fn set_display(&mut self, node: &Self::Node, display: &DisplayStyle);
    fn set_style(&mut self, node: &Self::Node, property: &str, value: &str);
    fn set_src(&mut self, node: &Self::Node, url: &str);
    fn src(&self, node: &Self::Node) -> Option<String>;
    fn set_inner_html(&mut self, node: &Self::Node, html: &str);
    fn set_class(&mut self, node: &Self::Node, class: &str, on: bool);
    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;
    /// `node` is `ancestor` or one of its descendants.
    fn contains(&self, ancestor: &Self::Node, node: &Self::Node) -> bool;

    /// Return the element matching `selector`, creating it under `<body>`
    /// with the given inline style when missing. `None` if it cannot be created.
    fn ensure_element(&mut self, selector: &Selector, css: &str) -> Option<Self::Node>;

    /// Warm the image cache.
    fn preload(&mut self, url: &str);

    /// Toggle `overflow: hidden` on the document body.
    fn lock_scroll(&mut self, locked: bool);

    // ── Viewport ───────────────────────────────────────────────────────
    fn scroll_offset(&self) -> f64;
    fn viewport_height(&self) -> f64;
    fn bounding_rect(&self, node: &Self::Node) -> Rect;
    fn scroll_to(&mut self, offset: f64, smooth: bool);
    fn open_in_new_context(&mut self, url: &str);

    // ── Media ──────────────────────────────────────────────────────────
    fn pause(&mut self, node: &Self::Node);
    /// Reset playback position to the start.
    fn rewind(&mut self, node: &Self::Node);
    /// Issue `play()`. Completion is reported asynchronously through `cue`.
    fn play(&mut self, node: &Self::Node, cue: PlayCue);
    /// Play a one-off sound that is not part of the document.
    fn play_url(&mut self, url: &str, cue: PlayCue);

    // ── Scheduling ─────────────────────────────────────────────────────
    fn set_timeout(&mut self, delay: Duration, key: TimerKey) -> TimerHandle;
    fn clear_timeout(&mut self, handle: TimerHandle);
    fn observe(&mut self, node: &Self::Node, spec: ObserverSpec, key: ObserverKey);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_defaults_to_block() {
        assert_eq!(DisplayStyle::default().as_str(), "block");
        assert!(DisplayStyle::hidden().is_hidden());
        assert!(!DisplayStyle::new("flex").is_hidden());
    }

    #[test]
    fn rect_viewport_overlap() {
        let rect = Rect { left: 0.0, top: 700.0, width: 100.0, height: 200.0 };
        assert!(rect.overlaps_viewport(800.0));
        assert!(!rect.overlaps_viewport(700.0));
        let above = Rect { top: -200.0, ..rect };
        assert!(!above.overlaps_viewport(800.0));
    }

    #[test]
    fn rejection_returns_fallback_only_when_configured() {
        let err = PlaybackError("NotAllowedError".into());
        assert_eq!(PlayCue::new("door").rejected(&err), None);
        let cue = PlayCue::new("video").with_fallback("./assets/video/breaking.mp4");
        assert_eq!(cue.rejected(&err), Some("./assets/video/breaking.mp4"));
    }
}
