//! Visibility controller: shows and hides each reveal group as the page scrolls.
//!
//! Every scroll event re-arms a per-group debounce timer; only the live
//! scroll offset at the moment the timer fires is evaluated.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::audio::AudioArbitrator;
use crate::host::{DisplayStyle, Host, TimerHandle, TimerKey};
use crate::registry::{Registry, RevealRule, RuleId};

/// When a visible group's audio cue is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CuePolicy {
    /// Only on the hidden → visible transition.
    #[default]
    Edge,
    /// On every evaluation that finds the group visible. Restarts the
    /// track on each settled scroll while the section is on screen.
    EveryTick,
}

#[derive(Debug)]
struct RevealGroup<N> {
    rule: RevealRule,
    elements: Vec<N>,
    visible: bool,
    pending: Option<TimerHandle>,
    evaluations: u64,
}

impl<N> RevealGroup<N> {
    fn is_inert(&self) -> bool {
        self.elements.is_empty()
    }
}

#[derive(Debug)]
pub struct VisibilityController<N> {
    groups: Vec<RevealGroup<N>>,
    policy: CuePolicy,
}

impl<N: Clone + PartialEq + fmt::Debug> VisibilityController<N> {
    /// Resolve each rule's elements once and hide all of them.
    ///
    /// A rule whose selector matches nothing is logged and stays inert.
    pub fn attach<H: Host<Node = N>>(host: &mut H, registry: &Registry, policy: CuePolicy) -> Self {
        let hidden = DisplayStyle::hidden();
        let groups = registry
            .rules()
            .iter()
            .map(|rule| {
                let elements = host.query_all(&rule.selector);
                if elements.is_empty() {
                    warn!(
                        selector = %rule.selector,
                        "no elements match reveal rule, rule is inert"
                    );
                }
                for el in &elements {
                    host.set_display(el, &hidden);
                }
                RevealGroup {
                    rule: rule.clone(),
                    elements,
                    visible: false,
                    pending: None,
                    evaluations: 0,
                }
            })
            .collect();

        Self { groups, policy }
    }

    /// Evaluate every live group against the current offset, without debounce.
    /// Run once after `attach` so a restored scroll position shows its content.
    pub fn initial_pass<H: Host<Node = N>>(
        &mut self,
        host: &mut H,
        audio: &mut AudioArbitrator<N>,
    ) {
        let policy = self.policy;
        for group in self.groups.iter_mut().filter(|g| !g.is_inert()) {
            evaluate(host, group, policy, audio);
        }
    }

    /// Cancel each group's pending evaluation and schedule a fresh one.
    pub fn on_scroll<H: Host<Node = N>>(&mut self, host: &mut H) {
        for group in self.groups.iter_mut().filter(|g| !g.is_inert()) {
            if let Some(handle) = group.pending.take() {
                host.clear_timeout(handle);
            }
            let key = TimerKey::Reveal(group.rule.id);
            group.pending = Some(host.set_timeout(group.rule.debounce, key));
        }
    }

    /// A debounce timer elapsed for `id`.
    pub fn on_timer<H: Host<Node = N>>(
        &mut self,
        host: &mut H,
        id: RuleId,
        audio: &mut AudioArbitrator<N>,
    ) {
        let policy = self.policy;
        let Some(group) = self.groups.get_mut(id.0) else {
            debug!(rule = id.0, "timer for unknown rule");
            return;
        };
        group.pending = None;
        if !group.is_inert() {
            evaluate(host, group, policy, audio);
        }
    }

    pub fn is_visible(&self, id: RuleId) -> bool {
        self.groups.get(id.0).map_or(false, |g| g.visible)
    }

    pub fn is_inert(&self, id: RuleId) -> bool {
        self.groups.get(id.0).map_or(true, |g| g.is_inert())
    }

    pub fn is_pending(&self, id: RuleId) -> bool {
        self.groups.get(id.0).map_or(false, |g| g.pending.is_some())
    }

    /// How many times the group has been evaluated.
    pub fn evaluations(&self, id: RuleId) -> u64 {
        self.groups.get(id.0).map_or(0, |g| g.evaluations)
    }

    pub fn policy(&self) -> CuePolicy {
        self.policy
    }

    /// Rules currently shown, in registration order.
    pub fn visible_rules(&self) -> impl Iterator<Item = &RevealRule> {
        self.groups.iter().filter(|g| g.visible).map(|g| &g.rule)
    }
}

fn evaluate<H: Host>(
    host: &mut H,
    group: &mut RevealGroup<H::Node>,
    policy: CuePolicy,
    audio: &mut AudioArbitrator<H::Node>,
) {
    let offset = host.scroll_offset();
    let show = group.rule.should_show(offset);
    let style = if show {
        group.rule.display.clone()
    } else {
        DisplayStyle::hidden()
    };
    for el in &group.elements {
        host.set_display(el, &style);
    }

    let became_visible = show && !group.visible;
    if show != group.visible {
        debug!(selector = %group.rule.selector, offset, visible = show, "reveal group toggled");
    }
    group.visible = show;
    group.evaluations += 1;

    let cue = match policy {
        CuePolicy::Edge => became_visible,
        CuePolicy::EveryTick => show,
    };
    if cue {
        if let Some(selector) = &group.rule.audio {
            audio.request_play(host, selector);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::registry::RuleOptions;
    use crate::selector::Selector;
    use crate::sim::{SimElement, SimEvent, SimHost};

    fn sel(s: &str) -> Selector {
        Selector::parse(s).unwrap()
    }

    struct Fixture {
        host: SimHost,
        audio: AudioArbitrator<usize>,
        vis: VisibilityController<usize>,
    }

    impl Fixture {
        fn new(registry: &Registry, policy: CuePolicy, initial_offset: f64) -> Self {
            let mut host = SimHost::new();
            host.add(SimElement::new().class("five-img"));
            host.add(SimElement::new().class("five-img"));
            host.add(SimElement::new().class("audio-3"));
            host.add(SimElement::new().class("group-1"));
            host.set_scroll(initial_offset);
            let audio = AudioArbitrator::mount(&host, &[], &registry.audio_selectors());
            let vis = VisibilityController::attach(&mut host, registry, policy);
            Self { host, audio, vis }
        }

        fn scroll_and_settle(&mut self, offset: f64) {
            self.host.set_scroll(offset);
            self.vis.on_scroll(&mut self.host);
            for key in self.host.advance(Duration::from_secs(1)) {
                let TimerKey::Reveal(id) = key;
                self.vis.on_timer(&mut self.host, id, &mut self.audio);
            }
        }

        fn audio_plays(&self) -> usize {
            self.host
                .log()
                .iter()
                .filter(|e| matches!(e, SimEvent::Play { node: 2, .. }))
                .count()
        }
    }

    fn five_img_registry() -> Registry {
        let mut reg = Registry::new();
        reg.register(sel("five-img"), 2100.0, Some(sel("audio-3")), RuleOptions::default())
            .unwrap();
        reg
    }

    #[test]
    fn attach_hides_everything_regardless_of_offset() {
        let fx = Fixture::new(&five_img_registry(), CuePolicy::Edge, 5000.0);
        assert_eq!(fx.host.element(0).display.as_deref(), Some("none"));
        assert_eq!(fx.host.element(1).display.as_deref(), Some("none"));
        assert!(!fx.vis.is_visible(RuleId(0)));
    }

    #[test]
    fn initial_pass_matches_restored_offset() {
        let mut fx = Fixture::new(&five_img_registry(), CuePolicy::Edge, 5000.0);
        fx.vis.initial_pass(&mut fx.host, &mut fx.audio);
        assert!(fx.vis.is_visible(RuleId(0)));
        assert_eq!(fx.host.element(0).display.as_deref(), Some("block"));
        assert_eq!(fx.audio_plays(), 1);
    }

    #[test]
    fn recrossing_threshold_retriggers_audio() {
        let mut fx = Fixture::new(&five_img_registry(), CuePolicy::Edge, 0.0);
        fx.vis.initial_pass(&mut fx.host, &mut fx.audio);

        let mut seen = Vec::new();
        for offset in [0.0, 2100.0, 2099.0, 2100.0] {
            fx.scroll_and_settle(offset);
            seen.push((fx.vis.is_visible(RuleId(0)), fx.audio_plays()));
        }
        assert_eq!(seen, vec![(false, 0), (true, 1), (false, 1), (true, 2)]);
        assert_eq!(fx.host.element(1).display.as_deref(), Some("block"));
    }

    #[test]
    fn edge_policy_does_not_restart_while_visible() {
        let mut fx = Fixture::new(&five_img_registry(), CuePolicy::Edge, 0.0);
        for offset in [2100.0, 2200.0, 2300.0] {
            fx.scroll_and_settle(offset);
        }
        assert_eq!(fx.audio_plays(), 1);
    }

    #[test]
    fn every_tick_policy_restarts_on_each_settle() {
        let mut fx = Fixture::new(&five_img_registry(), CuePolicy::EveryTick, 0.0);
        for offset in [2100.0, 2200.0, 2300.0] {
            fx.scroll_and_settle(offset);
        }
        assert_eq!(fx.audio_plays(), 3);
    }

    #[test]
    fn rapid_scrolls_collapse_into_one_evaluation() {
        let mut reg = Registry::new();
        let opts = RuleOptions { debounce_ms: 50, ..RuleOptions::default() };
        reg.register(sel("group-1"), 300.0, None, opts).unwrap();
        let mut fx = Fixture::new(&reg, CuePolicy::Edge, 0.0);

        for offset in [100.0, 200.0, 350.0, 250.0, 320.0] {
            fx.host.set_scroll(offset);
            fx.vis.on_scroll(&mut fx.host);
            assert!(fx.host.advance(Duration::from_millis(10)).is_empty());
        }
        assert!(fx.vis.is_pending(RuleId(0)));

        let fired = fx.host.advance(Duration::from_millis(50));
        assert_eq!(fired, vec![TimerKey::Reveal(RuleId(0))]);
        fx.vis.on_timer(&mut fx.host, RuleId(0), &mut fx.audio);

        assert_eq!(fx.vis.evaluations(RuleId(0)), 1);
        assert!(fx.vis.is_visible(RuleId(0)));
        assert!(!fx.vis.is_pending(RuleId(0)));
    }

    #[test]
    fn scrolling_to_same_offset_is_idempotent() {
        let mut fx = Fixture::new(&five_img_registry(), CuePolicy::Edge, 0.0);
        fx.scroll_and_settle(2500.0);
        fx.scroll_and_settle(2500.0);
        assert!(fx.vis.is_visible(RuleId(0)));
        assert_eq!(fx.host.element(0).display.as_deref(), Some("block"));
        assert_eq!(fx.audio_plays(), 1);
    }

    #[test]
    fn missing_elements_make_rule_inert_without_stopping_others() {
        let mut reg = Registry::new();
        reg.register(sel("not-on-page"), 10.0, None, RuleOptions::default()).unwrap();
        reg.register(sel("group-1"), 20.0, None, RuleOptions::default()).unwrap();
        let mut fx = Fixture::new(&reg, CuePolicy::Edge, 0.0);

        assert!(fx.vis.is_inert(RuleId(0)));
        assert!(!fx.vis.is_inert(RuleId(1)));

        fx.scroll_and_settle(100.0);
        assert!(!fx.vis.is_pending(RuleId(0)));
        assert_eq!(fx.vis.evaluations(RuleId(0)), 0);
        assert!(fx.vis.is_visible(RuleId(1)));
    }

    #[test]
    fn custom_display_style_is_applied() {
        let mut reg = Registry::new();
        let opts = RuleOptions { display: DisplayStyle::new("flex"), ..RuleOptions::default() };
        reg.register(sel("group-1"), 0.0, None, opts).unwrap();
        let mut fx = Fixture::new(&reg, CuePolicy::Edge, 0.0);
        fx.vis.initial_pass(&mut fx.host, &mut fx.audio);
        assert_eq!(fx.host.element(3).display.as_deref(), Some("flex"));
    }
}
