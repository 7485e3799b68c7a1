//! Viewport-driven video autoplay and named play shortcuts.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::host::{Host, IntersectionEntry, ObserverKey, ObserverSpec, PlayCue};
use crate::selector::Selector;

fn default_threshold() -> f64 {
    0.5
}

/// A video that plays while enough of it is on screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VideoSpec {
    pub target: Selector,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

/// A named play request wired to a page control (inline `onclick` handlers).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShortcutSpec {
    pub name: String,
    pub target: Selector,
    /// Opened in a new browsing context when playback is refused.
    #[serde(default)]
    pub fallback_url: Option<String>,
}

#[derive(Debug)]
struct Autoplay<N> {
    spec: VideoSpec,
    node: N,
    playing: bool,
}

#[derive(Debug)]
pub struct AutoplayVideos<N> {
    slots: Vec<Option<Autoplay<N>>>,
}

impl<N: Clone + PartialEq + fmt::Debug> AutoplayVideos<N> {
    pub fn mount<H: Host<Node = N>>(host: &mut H, specs: &[VideoSpec]) -> Self {
        let slots = specs
            .iter()
            .enumerate()
            .map(|(i, spec)| {
                let Some(node) = host.query(&spec.target) else {
                    warn!(video = %spec.target, "video element not found");
                    return None;
                };
                let observer = ObserverSpec {
                    threshold: spec.threshold,
                    root_margin_px: 0.0,
                };
                host.observe(&node, observer, ObserverKey::Video(i));
                Some(Autoplay {
                    spec: spec.clone(),
                    node,
                    playing: false,
                })
            })
            .collect();
        Self { slots }
    }

    /// Play once the visible fraction reaches the threshold, pause below it.
    pub fn on_intersection<H: Host<Node = N>>(
        &mut self,
        host: &mut H,
        index: usize,
        entry: IntersectionEntry,
    ) {
        let Some(Some(video)) = self.slots.get_mut(index) else {
            return;
        };
        let in_view = entry.is_intersecting && entry.ratio >= video.spec.threshold;
        if in_view {
            debug!(video = %video.spec.target, ratio = entry.ratio, "video entered viewport");
            host.play(&video.node, PlayCue::new(format!("autoplay {}", video.spec.target)));
        } else if video.playing {
            debug!(video = %video.spec.target, ratio = entry.ratio, "video left viewport");
            host.pause(&video.node);
        }
        video.playing = in_view;
    }

    pub fn is_playing(&self, index: usize) -> bool {
        matches!(self.slots.get(index), Some(Some(v)) if v.playing)
    }
}

#[derive(Debug)]
pub struct Shortcuts<N> {
    entries: Vec<(ShortcutSpec, Option<N>)>,
}

impl<N: Clone + PartialEq + fmt::Debug> Shortcuts<N> {
    pub fn mount<H: Host<Node = N>>(host: &H, specs: &[ShortcutSpec]) -> Self {
        let entries = specs
            .iter()
            .map(|spec| {
                let node = host.query(&spec.target);
                if node.is_none() {
                    warn!(
                        shortcut = %spec.name,
                        element = %spec.target,
                        "shortcut target not found"
                    );
                }
                (spec.clone(), node)
            })
            .collect();
        Self { entries }
    }

    /// Returns false for an unknown name or a missing element.
    pub fn play<H: Host<Node = N>>(&self, host: &mut H, name: &str) -> bool {
        let Some((spec, node)) = self.entries.iter().find(|(s, _)| s.name == name) else {
            debug!(shortcut = name, "unknown shortcut");
            return false;
        };
        let Some(node) = node else {
            return false;
        };
        let cue = match &spec.fallback_url {
            Some(url) => PlayCue::new(name).with_fallback(url.clone()),
            None => PlayCue::new(name),
        };
        host.play(node, cue);
        true
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(s, _)| s.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimElement, SimEvent, SimHost};

    fn sel(s: &str) -> Selector {
        Selector::parse(s).unwrap()
    }

    fn main_video() -> VideoSpec {
        VideoSpec {
            target: sel("#main-video"),
            threshold: 0.5,
        }
    }

    fn seen(ratio: f64) -> IntersectionEntry {
        IntersectionEntry {
            ratio,
            is_intersecting: true,
        }
    }

    #[test]
    fn video_plays_in_view_and_pauses_out_of_view() {
        let mut host = SimHost::new();
        host.add(SimElement::new().id("main-video"));
        let mut videos = AutoplayVideos::mount(&mut host, &[main_video()]);
        assert_eq!(host.observers()[0].2, ObserverKey::Video(0));

        videos.on_intersection(&mut host, 0, seen(0.6));
        assert!(videos.is_playing(0));
        assert_eq!(host.playing(), vec![0]);

        videos.on_intersection(&mut host, 0, seen(0.4));
        assert!(!videos.is_playing(0));
        assert!(host.playing().is_empty());
    }

    #[test]
    fn video_out_of_view_before_playing_does_not_pause() {
        let mut host = SimHost::new();
        host.add(SimElement::new().id("main-video"));
        let mut videos = AutoplayVideos::mount(&mut host, &[main_video()]);
        let gone = IntersectionEntry {
            ratio: 0.0,
            is_intersecting: false,
        };
        videos.on_intersection(&mut host, 0, gone);
        assert!(host.log().is_empty());
    }

    #[test]
    fn shortcut_fallback_opens_new_context_on_rejection() {
        let mut host = SimHost::new();
        host.add(SimElement::new().id("myVideo"));
        host.reject_playback("NotAllowedError");
        let shortcuts = Shortcuts::mount(
            &host,
            &[ShortcutSpec {
                name: "playVid".into(),
                target: sel("#myVideo"),
                fallback_url: Some("./assets/video/breaking.mp4".into()),
            }],
        );
        assert!(shortcuts.play(&mut host, "playVid"));
        assert!(host
            .log()
            .contains(&SimEvent::Open("./assets/video/breaking.mp4".into())));
    }

    #[test]
    fn shortcut_without_fallback_only_logs() {
        let mut host = SimHost::new();
        host.add(SimElement::new().id("Audio"));
        host.reject_playback("NotAllowedError");
        let shortcuts = Shortcuts::mount(
            &host,
            &[ShortcutSpec { name: "playAudio".into(), target: sel("#Audio"), fallback_url: None }],
        );
        assert!(shortcuts.play(&mut host, "playAudio"));
        assert!(!host.log().iter().any(|e| matches!(e, SimEvent::Open(_))));
        assert_eq!(host.rejections(), 1);
    }

    #[test]
    fn unknown_or_missing_shortcut_returns_false() {
        let mut host = SimHost::new();
        let shortcuts = Shortcuts::mount(
            &host,
            &[ShortcutSpec {
                name: "playAudio2".into(),
                target: sel("#Audio2"),
                fallback_url: None,
            }],
        );
        assert!(!shortcuts.play(&mut host, "playAudio2"));
        assert!(!shortcuts.play(&mut host, "nope"));
        assert_eq!(shortcuts.names().collect::<Vec<_>>(), vec!["playAudio2"]);
    }
}
