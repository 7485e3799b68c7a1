//! One-shot triggers: play a cue the first time a target comes into view.
//!
//! A trigger may be watched by an intersection observer and, as backup, by a
//! geometry check on every scroll. Both paths share one [`Latch`], so the cue
//! is issued at most once per page lifetime whichever path sees it first.
//!
//! The latch closes when `play()` is *issued*. A rejected play is logged by
//! the host and not retried. A cue that belongs to an audio group is played
//! through the [`AudioArbitrator`] so it silences the rest of its group.

use std::cell::Cell;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::audio::AudioArbitrator;
use crate::host::{Host, IntersectionEntry, ObserverKey, ObserverSpec, PlayCue};
use crate::selector::Selector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerState {
    Armed,
    Fired,
}

/// `Armed -> Fired`, never back.
#[derive(Debug, Default)]
pub struct Latch(Cell<bool>);

impl Latch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Close the latch. Returns true only for the call that closed it.
    pub fn try_fire(&self) -> bool {
        !self.0.replace(true)
    }

    pub fn state(&self) -> TriggerState {
        if self.0.get() {
            TriggerState::Fired
        } else {
            TriggerState::Armed
        }
    }
}

fn default_threshold() -> f64 {
    0.5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TriggerSpec {
    pub name: String,
    /// Element whose visibility is watched.
    pub target: Selector,
    /// Media element played once.
    pub cue: Selector,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default)]
    pub root_margin_px: f64,
    /// Also check the target's bounding box on every scroll.
    #[serde(default)]
    pub scroll_backup: bool,
}

#[derive(Debug)]
struct OneShot<N> {
    spec: TriggerSpec,
    target: N,
    cue: N,
    latch: Latch,
}

impl<N: Clone + PartialEq + fmt::Debug> OneShot<N> {
    fn fire<H: Host<Node = N>>(
        &self,
        host: &mut H,
        audio: &mut AudioArbitrator<N>,
        via: &'static str,
    ) {
        if !self.latch.try_fire() {
            return;
        }
        debug!(trigger = %self.spec.name, via, "one-shot cue");
        let cue = PlayCue::new(self.spec.name.clone());
        if !audio.play_member(host, &self.spec.cue, cue.clone()) {
            host.play(&self.cue, cue);
        }
    }
}

/// All one-shot triggers of a page, indexed like their specs.
#[derive(Debug)]
pub struct Triggers<N> {
    slots: Vec<Option<OneShot<N>>>,
}

impl<N: Clone + PartialEq + fmt::Debug> Triggers<N> {
    /// Resolve targets and cues and start observing. A trigger missing either
    /// element is logged and stays inert.
    pub fn mount<H: Host<Node = N>>(host: &mut H, specs: &[TriggerSpec]) -> Self {
        let slots = specs
            .iter()
            .enumerate()
            .map(|(i, spec)| {
                let found = (host.query(&spec.target), host.query(&spec.cue));
                let (Some(target), Some(cue)) = found else {
                    warn!(
                        trigger = %spec.name,
                        watched = %spec.target,
                        cue = %spec.cue,
                        "trigger target or cue not found"
                    );
                    return None;
                };
                let observer = ObserverSpec {
                    threshold: spec.threshold,
                    root_margin_px: spec.root_margin_px,
                };
                host.observe(&target, observer, ObserverKey::Trigger(i));
                info!(
                    trigger = %spec.name,
                    threshold = spec.threshold,
                    margin = spec.root_margin_px,
                    "observing trigger target"
                );
                Some(OneShot {
                    spec: spec.clone(),
                    target,
                    cue,
                    latch: Latch::new(),
                })
            })
            .collect();
        Self { slots }
    }

    pub fn on_intersection<H: Host<Node = N>>(
        &self,
        host: &mut H,
        audio: &mut AudioArbitrator<N>,
        index: usize,
        entry: IntersectionEntry,
    ) {
        let Some(Some(trigger)) = self.slots.get(index) else {
            return;
        };
        if entry.is_intersecting && entry.ratio >= trigger.spec.threshold {
            trigger.fire(host, audio, "intersection");
        }
    }

    /// Geometry backup for triggers that asked for it.
    pub fn on_scroll<H: Host<Node = N>>(&self, host: &mut H, audio: &mut AudioArbitrator<N>) {
        let viewport = host.viewport_height();
        for trigger in self.slots.iter().flatten() {
            if !trigger.spec.scroll_backup || trigger.latch.state() == TriggerState::Fired {
                continue;
            }
            if host.bounding_rect(&trigger.target).overlaps_viewport(viewport) {
                trigger.fire(host, audio, "scroll");
            }
        }
    }

    /// `None` for an inert trigger.
    pub fn state(&self, index: usize) -> Option<TriggerState> {
        self.slots.get(index)?.as_ref().map(|t| t.latch.state())
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.as_ref().map_or(false, |t| t.spec.name == name))
    }
}
