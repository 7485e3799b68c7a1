//! The stage wires every controller to one host and routes host events.

use tracing::{debug, info};

use crate::audio::AudioArbitrator;
use crate::error::Result;
use crate::host::{Host, IntersectionEntry, ObserverKey, TimerKey};
use crate::modal::{ClickPoint, Modal};
use crate::nav::ChapterNav;
use crate::registry::Registry;
use crate::story::Story;
use crate::trigger::Triggers;
use crate::video::{AutoplayVideos, Shortcuts};
use crate::viewer::DocumentViewer;
use crate::visibility::VisibilityController;

pub struct Stage<H: Host> {
    host: H,
    registry: Registry,
    audio: AudioArbitrator<H::Node>,
    visibility: VisibilityController<H::Node>,
    triggers: Triggers<H::Node>,
    videos: AutoplayVideos<H::Node>,
    shortcuts: Shortcuts<H::Node>,
    modals: Vec<Modal<H::Node>>,
    viewer: Option<DocumentViewer<H::Node>>,
    nav: Option<ChapterNav<H::Node>>,
}

impl<H: Host> Stage<H> {
    /// Mount a story on `host`.
    ///
    /// Fails only on an invalid story. Elements missing from the page are
    /// logged and leave the affected feature inert.
    pub fn mount(mut host: H, story: &Story) -> Result<Self> {
        let registry = story.registry()?;

        let mut audio = AudioArbitrator::mount(&host, &story.audio, &registry.audio_selectors());
        let mut visibility = VisibilityController::attach(&mut host, &registry, story.cue_policy);
        visibility.initial_pass(&mut host, &mut audio);

        let triggers = Triggers::mount(&mut host, &story.triggers);
        let videos = AutoplayVideos::mount(&mut host, &story.videos);
        let shortcuts = Shortcuts::mount(&host, &story.shortcuts);
        let modals = story
            .modals
            .iter()
            .filter_map(|spec| Modal::mount(&mut host, spec))
            .collect();
        let viewer = story
            .viewer
            .as_ref()
            .and_then(|spec| DocumentViewer::mount(&mut host, spec));
        let nav = story.navigation.as_ref().map(|spec| ChapterNav::mount(&mut host, spec));

        info!(
            story = story.title.as_deref().unwrap_or("untitled"),
            rules = registry.len(),
            policy = ?story.cue_policy,
            "stage mounted"
        );
        Ok(Self {
            host,
            registry,
            audio,
            visibility,
            triggers,
            videos,
            shortcuts,
            modals,
            viewer,
            nav,
        })
    }

    pub fn scroll(&mut self) {
        self.visibility.on_scroll(&mut self.host);
        self.triggers.on_scroll(&mut self.host, &mut self.audio);
        if let Some(nav) = &mut self.nav {
            nav.on_scroll(&mut self.host);
        }
    }

    pub fn timer_fired(&mut self, key: TimerKey) {
        match key {
            TimerKey::Reveal(id) => self.visibility.on_timer(&mut self.host, id, &mut self.audio),
        }
    }

    pub fn intersection(&mut self, key: ObserverKey, entry: IntersectionEntry) {
        match key {
            ObserverKey::Trigger(i) => {
                self.triggers.on_intersection(&mut self.host, &mut self.audio, i, entry)
            }
            ObserverKey::Video(i) => self.videos.on_intersection(&mut self.host, i, entry),
        }
    }

    /// Route a click on `target`. Returns true when some control consumed it.
    pub fn click(&mut self, target: &H::Node, point: ClickPoint) -> bool {
        if let Some(nav) = &mut self.nav {
            if nav.on_click(&mut self.host, target) {
                return true;
            }
        }
        for modal in &mut self.modals {
            if modal.on_click(&mut self.host, target, point) {
                debug!(modal = modal.name(), open = modal.is_open(), "click handled");
                return true;
            }
        }
        false
    }

    pub fn key(&mut self, key: &str) -> bool {
        let mut handled = false;
        for modal in &mut self.modals {
            handled |= modal.on_key(&mut self.host, key);
        }
        handled
    }

    pub fn mouse_move(&mut self, target: &H::Node, x: f64, y: f64) {
        if let Some(viewer) = &mut self.viewer {
            if viewer.image() == target {
                viewer.on_mouse_move(&mut self.host, x, y);
            }
        }
    }

    pub fn mouse_leave(&mut self, target: &H::Node) {
        if let Some(viewer) = &mut self.viewer {
            if viewer.image() == target {
                viewer.on_mouse_leave(&mut self.host);
            }
        }
    }

    pub fn play_shortcut(&mut self, name: &str) -> bool {
        self.shortcuts.play(&mut self.host, name)
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn visibility(&self) -> &VisibilityController<H::Node> {
        &self.visibility
    }

    pub fn audio(&self) -> &AudioArbitrator<H::Node> {
        &self.audio
    }

    pub fn triggers(&self) -> &Triggers<H::Node> {
        &self.triggers
    }

    pub fn videos(&self) -> &AutoplayVideos<H::Node> {
        &self.videos
    }

    pub fn modal(&self, name: &str) -> Option<&Modal<H::Node>> {
        self.modals.iter().find(|m| m.name() == name)
    }

    pub fn viewer(&self) -> Option<&DocumentViewer<H::Node>> {
        self.viewer.as_ref()
    }

    /// The element the viewer listens on for pointer movement.
    pub fn hover_target(&self) -> Option<&H::Node> {
        self.viewer.as_ref().map(|v| v.image())
    }

    pub fn nav(&self) -> Option<&ChapterNav<H::Node>> {
        self.nav.as_ref()
    }
}
