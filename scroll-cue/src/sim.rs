//! In-memory host: a synthetic page with a manual clock.
//!
//! Used by the test suite and by `scroll-cue simulate`. Elements are laid out
//! on a single vertical axis; `bounding_rect` is the page position minus the
//! scroll offset. Timers fire only when [`SimHost::advance`] moves the clock,
//! and intersection entries are computed on demand by
//! [`SimHost::take_intersections`].

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::{debug, trace};

use crate::host::{
    DisplayStyle, Host, IntersectionEntry, ObserverKey, ObserverSpec, PlayCue, PlaybackError, Rect,
    TimerHandle, TimerKey,
};
use crate::selector::{Selector, SimpleSelector};
use crate::stage::Stage;
use crate::story::Story;

pub type NodeId = usize;

const DEFAULT_VIEWPORT_HEIGHT: f64 = 800.0;
const DEFAULT_WIDTH: f64 = 800.0;
const LAID_OUT_HEIGHT: f64 = 400.0;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaState {
    pub playing: bool,
    pub position: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimElement {
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attributes: BTreeMap<String, String>,
    pub parent: Option<NodeId>,
    pub page_top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
    /// `None` until something writes the display style.
    pub display: Option<String>,
    pub styles: BTreeMap<String, String>,
    pub inline_css: String,
    pub src: Option<String>,
    pub inner_html: String,
    pub media: MediaState,
}

impl Default for SimElement {
    fn default() -> Self {
        Self {
            id: None,
            classes: Vec::new(),
            attributes: BTreeMap::new(),
            parent: None,
            page_top: 0.0,
            left: 0.0,
            width: DEFAULT_WIDTH,
            height: 0.0,
            display: None,
            styles: BTreeMap::new(),
            inline_css: String::new(),
            src: None,
            inner_html: String::new(),
            media: MediaState::default(),
        }
    }
}

impl SimElement {
    pub fn new() -> Self {
        Self::default()
    }

    /// An element that `selector` matches.
    pub fn matching(selector: &Selector) -> Self {
        selector.parts().iter().fold(Self::new(), |el, part| match part {
            SimpleSelector::Class(c) => el.class(c),
            SimpleSelector::Id(id) => el.id(id),
        })
    }

    pub fn class(mut self, class: &str) -> Self {
        if !self.has_class(class) {
            self.classes.push(class.to_string());
        }
        self
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    /// Position on the page: top edge and height, in pixels.
    pub fn at(mut self, page_top: f64, height: f64) -> Self {
        self.page_top = page_top;
        self.height = height;
        self
    }

    pub fn width(mut self, width: f64) -> Self {
        self.width = width;
        self
    }

    pub fn src(mut self, url: &str) -> Self {
        self.src = Some(url.to_string());
        self
    }

    pub fn child_of(mut self, parent: NodeId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    /// Short CSS-style name for reports: `#id`, else the first class.
    pub fn label(&self) -> String {
        match (&self.id, self.classes.first()) {
            (Some(id), _) => format!("#{id}"),
            (None, Some(class)) => format!(".{class}"),
            (None, None) => "<anonymous>".to_string(),
        }
    }
}

/// Observable side effects, in the order the engine caused them.
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    Play { node: NodeId, label: String },
    Pause(NodeId),
    Rewind(NodeId),
    PlayUrl(String),
    Open(String),
    ScrollTo { offset: f64, smooth: bool },
}

#[derive(Debug)]
struct Timer {
    deadline: Duration,
    handle: TimerHandle,
    key: TimerKey,
}

#[derive(Debug)]
struct Observer {
    node: NodeId,
    spec: ObserverSpec,
    key: ObserverKey,
    /// Qualifying state last reported; `None` before the initial entry.
    last: Option<bool>,
}

#[derive(Debug)]
pub struct SimHost {
    elements: Vec<SimElement>,
    scroll: f64,
    viewport_height: f64,
    now: Duration,
    next_handle: u64,
    timers: Vec<Timer>,
    observers: Vec<Observer>,
    observer_view: Vec<(NodeId, ObserverSpec, ObserverKey)>,
    log: Vec<SimEvent>,
    reject: Option<String>,
    rejections: usize,
    scroll_locked: bool,
    preloaded: Vec<String>,
}

impl Default for SimHost {
    fn default() -> Self {
        Self::new()
    }
}

impl SimHost {
    pub fn new() -> Self {
        Self {
            elements: Vec::new(),
            scroll: 0.0,
            viewport_height: DEFAULT_VIEWPORT_HEIGHT,
            now: Duration::ZERO,
            next_handle: 0,
            timers: Vec::new(),
            observers: Vec::new(),
            observer_view: Vec::new(),
            log: Vec::new(),
            reject: None,
            rejections: 0,
            scroll_locked: false,
            preloaded: Vec::new(),
        }
    }

    /// Build a page containing one element for every selector the story
    /// mentions.
    ///
    /// Reveal targets are placed half a viewport below their threshold so
    /// they come into view as they are shown. `page_offsets` in the story
    /// overrides the position of any selector.
    pub fn for_story(story: &Story) -> Self {
        let mut host = Self::new();
        let half_view = host.viewport_height / 2.0;

        for rule in &story.rules {
            let top = rule.threshold + half_view;
            let node = host.ensure(&rule.selector);
            host.place(node, top);
            if let Some(audio) = &rule.audio {
                host.ensure(audio);
            }
        }
        for track in &story.audio {
            host.ensure(&track.selector);
        }
        for trigger in &story.triggers {
            host.ensure(&trigger.target);
            host.ensure(&trigger.cue);
        }
        for video in &story.videos {
            host.ensure(&video.target);
        }
        for shortcut in &story.shortcuts {
            host.ensure(&shortcut.target);
        }
        for modal in &story.modals {
            let overlay = host.ensure(&modal.overlay);
            if let Some(opener) = &modal.opener {
                host.ensure(opener);
            }
            if let Some(close) = &modal.close {
                host.ensure_within(close, overlay);
            }
            if let Some(swap) = &modal.content_swap {
                let body = host.ensure_within(&swap.body, overlay);
                host.ensure_within(&swap.trigger, body);
            }
        }
        if let Some(viewer) = &story.viewer {
            host.ensure(&viewer.image);
        }
        if let Some(nav) = &story.navigation {
            for chapter in &nav.chapters {
                let button = SimElement::matching(&nav.buttons).attr("data-target", &chapter.id);
                host.add(button);
            }
        }

        for (source, top) in &story.page_offsets {
            let Ok(selector) = Selector::parse(source) else {
                continue;
            };
            for node in host.query_all(&selector) {
                host.place(node, *top);
            }
        }
        debug!(elements = host.elements.len(), "simulated page built");
        host
    }

    pub fn add(&mut self, element: SimElement) -> NodeId {
        self.elements.push(element);
        self.elements.len() - 1
    }

    pub fn element(&self, id: NodeId) -> &SimElement {
        &self.elements[id]
    }

    pub fn element_mut(&mut self, id: NodeId) -> &mut SimElement {
        &mut self.elements[id]
    }

    pub fn elements(&self) -> &[SimElement] {
        &self.elements
    }

    /// Move the viewport without notifying anyone; callers deliver the
    /// scroll event themselves.
    pub fn set_scroll(&mut self, offset: f64) {
        self.scroll = offset;
    }

    pub fn set_viewport_height(&mut self, height: f64) {
        self.viewport_height = height;
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    /// Move the clock forward and return the keys of the timers that came
    /// due, earliest first.
    pub fn advance(&mut self, elapsed: Duration) -> Vec<TimerKey> {
        self.now += elapsed;
        let now = self.now;
        let (mut due, pending): (Vec<_>, Vec<_>) =
            self.timers.drain(..).partition(|t| t.deadline <= now);
        self.timers = pending;
        due.sort_by_key(|t| (t.deadline, t.handle.0));
        due.into_iter().map(|t| t.key).collect()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Entries for every observer whose qualifying state changed since it
    /// last reported. A new observer always reports once.
    pub fn take_intersections(&mut self) -> Vec<(ObserverKey, IntersectionEntry)> {
        let mut entries = Vec::new();
        for i in 0..self.observers.len() {
            let (node, spec) = (self.observers[i].node, self.observers[i].spec);
            let entry = self.intersection_of(node, spec.root_margin_px);
            let qualifies = entry.is_intersecting && entry.ratio >= spec.threshold;
            let observer = &mut self.observers[i];
            if observer.last != Some(qualifies) {
                observer.last = Some(qualifies);
                trace!(key = ?observer.key, ratio = entry.ratio, qualifies, "intersection change");
                entries.push((observer.key, entry));
            }
        }
        entries
    }

    pub fn log(&self) -> &[SimEvent] {
        &self.log
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    /// Nodes currently playing, ascending.
    pub fn playing(&self) -> Vec<NodeId> {
        (0..self.elements.len())
            .filter(|&i| self.elements[i].media.playing)
            .collect()
    }

    /// Reject every subsequent play request with `reason`, as an autoplay
    /// policy would.
    pub fn reject_playback(&mut self, reason: &str) {
        self.reject = Some(reason.to_string());
    }

    pub fn allow_playback(&mut self) {
        self.reject = None;
    }

    pub fn rejections(&self) -> usize {
        self.rejections
    }

    pub fn observers(&self) -> &[(NodeId, ObserverSpec, ObserverKey)] {
        &self.observer_view
    }

    pub fn scroll_locked(&self) -> bool {
        self.scroll_locked
    }

    pub fn preloaded(&self) -> &[String] {
        &self.preloaded
    }

    fn ensure(&mut self, selector: &Selector) -> NodeId {
        match self.query(selector) {
            Some(node) => node,
            None => self.add(SimElement::matching(selector)),
        }
    }

    fn ensure_within(&mut self, selector: &Selector, parent: NodeId) -> NodeId {
        match self.query(selector) {
            Some(node) => node,
            None => self.add(SimElement::matching(selector).child_of(parent)),
        }
    }

    fn place(&mut self, node: NodeId, page_top: f64) {
        let el = &mut self.elements[node];
        el.page_top = page_top;
        el.height = el.height.max(LAID_OUT_HEIGHT);
    }

    fn is_rendered(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            let el = &self.elements[id];
            if el.display.as_deref() == Some("none") {
                return false;
            }
            current = el.parent;
        }
        true
    }

    fn intersection_of(&self, node: NodeId, margin: f64) -> IntersectionEntry {
        let rect = self.bounding_rect(&node);
        if rect.height <= 0.0 {
            return IntersectionEntry { ratio: 0.0, is_intersecting: false };
        }
        let overlap = rect.bottom().min(self.viewport_height + margin) - rect.top.max(-margin);
        IntersectionEntry {
            ratio: (overlap / rect.height).clamp(0.0, 1.0),
            is_intersecting: overlap > 0.0,
        }
    }

    fn finish_play(&mut self, cue: PlayCue) -> bool {
        let Some(reason) = self.reject.clone() else {
            return true;
        };
        self.rejections += 1;
        if let Some(url) = cue.rejected(&PlaybackError(reason)) {
            self.open_in_new_context(url);
        }
        false
    }
}

impl Host for SimHost {
    type Node = NodeId;

    fn query_all(&self, selector: &Selector) -> Vec<NodeId> {
        self.elements
            .iter()
            .enumerate()
            .filter(|(_, el)| {
                selector.matches(el.id.as_deref(), el.classes.iter().map(String::as_str))
            })
            .map(|(i, _)| i)
            .collect()
    }

    fn set_display(&mut self, node: &NodeId, display: &DisplayStyle) {
        self.elements[*node].display = Some(display.as_str().to_string());
    }

    fn set_style(&mut self, node: &NodeId, property: &str, value: &str) {
        self.elements[*node].styles.insert(property.to_string(), value.to_string());
    }

    fn set_src(&mut self, node: &NodeId, url: &str) {
        self.elements[*node].src = Some(url.to_string());
    }

    fn src(&self, node: &NodeId) -> Option<String> {
        self.elements[*node].src.clone()
    }

    fn set_inner_html(&mut self, node: &NodeId, html: &str) {
        self.elements[*node].inner_html = html.to_string();
    }

    fn set_class(&mut self, node: &NodeId, class: &str, on: bool) {
        let el = &mut self.elements[*node];
        if on {
            if !el.has_class(class) {
                el.classes.push(class.to_string());
            }
        } else {
            el.classes.retain(|c| c != class);
        }
    }

    fn attribute(&self, node: &NodeId, name: &str) -> Option<String> {
        self.elements[*node].attributes.get(name).cloned()
    }

    fn contains(&self, ancestor: &NodeId, node: &NodeId) -> bool {
        let mut current = Some(*node);
        while let Some(id) = current {
            if id == *ancestor {
                return true;
            }
            current = self.elements.get(id).and_then(|el| el.parent);
        }
        false
    }

    fn ensure_element(&mut self, selector: &Selector, css: &str) -> Option<NodeId> {
        if let Some(node) = self.query(selector) {
            return Some(node);
        }
        let mut element = SimElement::matching(selector);
        element.inline_css = css.to_string();
        Some(self.add(element))
    }

    fn preload(&mut self, url: &str) {
        self.preloaded.push(url.to_string());
    }

    fn lock_scroll(&mut self, locked: bool) {
        self.scroll_locked = locked;
    }

    fn scroll_offset(&self) -> f64 {
        self.scroll
    }

    fn viewport_height(&self) -> f64 {
        self.viewport_height
    }

    fn bounding_rect(&self, node: &NodeId) -> Rect {
        if !self.is_rendered(*node) {
            return Rect::default();
        }
        let el = &self.elements[*node];
        Rect {
            left: el.left,
            top: el.page_top - self.scroll,
            width: el.width,
            height: el.height,
        }
    }

    fn scroll_to(&mut self, offset: f64, smooth: bool) {
        self.log.push(SimEvent::ScrollTo { offset, smooth });
        self.scroll = offset;
    }

    fn open_in_new_context(&mut self, url: &str) {
        self.log.push(SimEvent::Open(url.to_string()));
    }

    fn pause(&mut self, node: &NodeId) {
        self.log.push(SimEvent::Pause(*node));
        self.elements[*node].media.playing = false;
    }

    fn rewind(&mut self, node: &NodeId) {
        self.log.push(SimEvent::Rewind(*node));
        self.elements[*node].media.position = 0.0;
    }

    fn play(&mut self, node: &NodeId, cue: PlayCue) {
        self.log.push(SimEvent::Play { node: *node, label: cue.label.clone() });
        if self.finish_play(cue) {
            self.elements[*node].media.playing = true;
        }
    }

    fn play_url(&mut self, url: &str, cue: PlayCue) {
        self.log.push(SimEvent::PlayUrl(url.to_string()));
        self.finish_play(cue);
    }

    fn set_timeout(&mut self, delay: Duration, key: TimerKey) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;
        self.timers.push(Timer { deadline: self.now + delay, handle, key });
        handle
    }

    fn clear_timeout(&mut self, handle: TimerHandle) {
        self.timers.retain(|t| t.handle != handle);
    }

    fn observe(&mut self, node: &NodeId, spec: ObserverSpec, key: ObserverKey) {
        self.observers.push(Observer { node: *node, spec, key, last: None });
        self.observer_view.push((*node, spec, key));
    }
}

/// Drivers that play the part of the browser event loop.
impl Stage<SimHost> {
    /// Scroll to `offset` and deliver the scroll event and any
    /// intersection changes it caused.
    pub fn scroll_to_offset(&mut self, offset: f64) {
        self.host_mut().set_scroll(offset);
        self.scroll();
        self.deliver_intersections();
    }

    /// Let `elapsed` pass: fire due timers, then deliver intersections.
    pub fn settle(&mut self, elapsed: Duration) {
        let due = self.host_mut().advance(elapsed);
        for key in due {
            self.timer_fired(key);
        }
        self.deliver_intersections();
    }

    pub fn deliver_intersections(&mut self) {
        let entries = self.host_mut().take_intersections();
        for (key, entry) in entries {
            self.intersection(key, entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RuleId;

    #[test]
    fn timers_fire_in_deadline_order_and_cancel() {
        let mut host = SimHost::new();
        let late = host.set_timeout(Duration::from_millis(30), TimerKey::Reveal(RuleId(0)));
        host.set_timeout(Duration::from_millis(20), TimerKey::Reveal(RuleId(1)));
        host.set_timeout(Duration::from_millis(10), TimerKey::Reveal(RuleId(2)));
        host.clear_timeout(late);

        assert!(host.advance(Duration::from_millis(5)).is_empty());
        assert_eq!(
            host.advance(Duration::from_millis(20)),
            vec![TimerKey::Reveal(RuleId(2)), TimerKey::Reveal(RuleId(1))]
        );
        assert_eq!(host.pending_timers(), 0);
    }

    #[test]
    fn queries_match_compound_selectors() {
        let mut host = SimHost::new();
        host.add(SimElement::new().class("image-16").class("music"));
        host.add(SimElement::new().class("image-16"));
        host.add(SimElement::new().id("modal"));
        assert_eq!(host.query_all(&Selector::parse(".image-16.music").unwrap()), vec![0]);
        assert_eq!(host.query_all(&Selector::parse("image-16").unwrap()), vec![0, 1]);
        assert_eq!(host.query(&Selector::parse("#modal").unwrap()), Some(2));
    }

    #[test]
    fn hidden_ancestor_collapses_rect() {
        let mut host = SimHost::new();
        let parent = host.add(SimElement::new().at(100.0, 500.0));
        let child = host.add(SimElement::new().at(200.0, 100.0).child_of(parent));
        host.set_display(&parent, &DisplayStyle::hidden());
        assert_eq!(host.bounding_rect(&child), Rect::default());
        assert!(host.contains(&parent, &child));
        assert!(!host.contains(&child, &parent));
    }

    #[test]
    fn intersections_report_on_change_only() {
        let mut host = SimHost::new();
        host.add(SimElement::new().at(1000.0, 400.0));
        let spec = ObserverSpec { threshold: 0.5, root_margin_px: 0.0 };
        host.observe(&0, spec, ObserverKey::Video(0));

        let initial = host.take_intersections();
        assert_eq!(initial.len(), 1);
        assert!(!initial[0].1.is_intersecting);
        assert!(host.take_intersections().is_empty());

        host.set_scroll(500.0);
        let entries = host.take_intersections();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].1.ratio, 0.75);

        host.set_scroll(550.0);
        assert!(host.take_intersections().is_empty());
    }

    #[test]
    fn root_margin_extends_viewport() {
        let mut host = SimHost::new();
        host.add(SimElement::new().at(830.0, 100.0));
        let spec = ObserverSpec {
            threshold: 0.1,
            root_margin_px: 50.0,
        };
        host.observe(&0, spec, ObserverKey::Trigger(0));
        let entries = host.take_intersections();
        assert!(entries[0].1.is_intersecting);
        assert!((entries[0].1.ratio - 0.2).abs() < 1e-9);
    }
}
