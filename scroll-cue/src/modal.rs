//! Modal dialogs: open from an element, close by button, backdrop or Escape.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::host::{DisplayStyle, Host, PlayCue};
use crate::selector::Selector;

/// Part of the opener that accepts the opening click.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenRegion {
    #[default]
    Whole,
    /// Only clicks right of the opener's horizontal midpoint.
    RightHalf,
}

/// Replace the dialog body when an element inside it is clicked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContentSwap {
    pub trigger: Selector,
    pub body: Selector,
    pub html: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModalSpec {
    pub name: String,
    pub overlay: Selector,
    #[serde(default)]
    pub opener: Option<Selector>,
    #[serde(default)]
    pub close: Option<Selector>,
    #[serde(default)]
    pub open_region: OpenRegion,
    /// One-off sound played on open.
    #[serde(default)]
    pub open_sound: Option<String>,
    #[serde(default)]
    pub content_swap: Option<ContentSwap>,
}

/// Client coordinates of a pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClickPoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug)]
struct Swap<N> {
    trigger: N,
    body: Option<N>,
    html: String,
}

#[derive(Debug)]
pub struct Modal<N> {
    spec: ModalSpec,
    overlay: N,
    opener: Option<N>,
    close: Option<N>,
    swap: Option<Swap<N>>,
    open: bool,
}

impl<N: Clone + PartialEq + fmt::Debug> Modal<N> {
    /// `None` when the overlay itself is missing.
    pub fn mount<H: Host<Node = N>>(host: &mut H, spec: &ModalSpec) -> Option<Self> {
        let Some(overlay) = host.query(&spec.overlay) else {
            warn!(modal = %spec.name, overlay = %spec.overlay, "modal overlay not found");
            return None;
        };
        let lookup = |host: &H, selector: &Option<Selector>, role: &str| {
            let selector = selector.as_ref()?;
            let node = host.query(selector);
            if node.is_none() {
                warn!(modal = %spec.name, role, %selector, "modal control not found");
            }
            node
        };
        let opener = lookup(&*host, &spec.opener, "opener");
        let close = lookup(&*host, &spec.close, "close");

        let swap = spec.content_swap.as_ref().and_then(|swap| {
            let trigger = host.query(&swap.trigger)?;
            host.set_style(&trigger, "cursor", "pointer");
            Some(Swap {
                trigger,
                body: host.query(&swap.body),
                html: swap.html.clone(),
            })
        });

        Some(Self {
            spec: spec.clone(),
            overlay,
            opener,
            close,
            swap,
            open: false,
        })
    }

    /// Handle a click whose event target is `target`. Returns true if consumed.
    pub fn on_click<H: Host<Node = N>>(
        &mut self,
        host: &mut H,
        target: &N,
        point: ClickPoint,
    ) -> bool {
        if let Some(opener) = self.opener.clone() {
            if host.contains(&opener, target) {
                if self.accepts(host, &opener, point) {
                    self.show(host);
                }
                return true;
            }
        }
        if self.close.as_ref().map_or(false, |close| host.contains(close, target)) {
            self.hide(host);
            return true;
        }
        if let Some(swap) = &self.swap {
            if host.contains(&swap.trigger, target) {
                if let Some(body) = &swap.body {
                    debug!(modal = %self.spec.name, "swapping modal body");
                    host.set_inner_html(body, &swap.html);
                }
                return true;
            }
        }
        // Backdrop: the overlay itself, not its content.
        if target == &self.overlay {
            self.hide(host);
            return true;
        }
        false
    }

    /// Escape closes an open dialog.
    pub fn on_key<H: Host<Node = N>>(&mut self, host: &mut H, key: &str) -> bool {
        if key == "Escape" && self.open {
            self.hide(host);
            return true;
        }
        false
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    fn accepts<H: Host<Node = N>>(&self, host: &H, opener: &N, point: ClickPoint) -> bool {
        match self.spec.open_region {
            OpenRegion::Whole => true,
            OpenRegion::RightHalf => {
                let rect = host.bounding_rect(opener);
                point.x - rect.left > rect.width * 0.5
            }
        }
    }

    fn show<H: Host<Node = N>>(&mut self, host: &mut H) {
        if let Some(url) = &self.spec.open_sound {
            host.play_url(url, PlayCue::new(format!("{} open sound", self.spec.name)));
        }
        host.set_display(&self.overlay, &DisplayStyle::default());
        host.lock_scroll(true);
        self.open = true;
    }

    fn hide<H: Host<Node = N>>(&mut self, host: &mut H) {
        host.set_display(&self.overlay, &DisplayStyle::hidden());
        host.lock_scroll(false);
        self.open = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimElement, SimEvent, SimHost};

    fn sel(s: &str) -> Selector {
        Selector::parse(s).unwrap()
    }

    fn doc_modal() -> ModalSpec {
        ModalSpec {
            name: "chapter3-doc".into(),
            overlay: sel("#chapter3-doc-modal"),
            opener: Some(sel("#chapter3-page2")),
            close: Some(sel("#chapter3-doc-close")),
            open_region: OpenRegion::RightHalf,
            open_sound: Some("./assets/video/main-door-opening-closing-38280.mp3".into()),
            content_swap: None,
        }
    }

    fn host() -> SimHost {
        let mut host = SimHost::new();
        host.add(SimElement::new().id("chapter3-page2").at(0.0, 300.0).width(600.0));
        let overlay = host.add(SimElement::new().id("chapter3-doc-modal"));
        host.add(SimElement::new().id("chapter3-doc-close").child_of(overlay));
        host
    }

    #[test]
    fn right_half_click_opens_with_sound() {
        let mut host = host();
        let mut modal = Modal::mount(&mut host, &doc_modal()).unwrap();

        assert!(modal.on_click(&mut host, &0, ClickPoint { x: 100.0, y: 10.0 }));
        assert!(!modal.is_open());

        modal.on_click(&mut host, &0, ClickPoint { x: 450.0, y: 10.0 });
        assert!(modal.is_open());
        assert_eq!(host.element(1).display.as_deref(), Some("block"));
        assert!(host.scroll_locked());
        assert!(host.log().iter().any(|e| matches!(e, SimEvent::PlayUrl(u) if u.contains("door"))));
    }

    #[test]
    fn close_button_backdrop_and_escape_close() {
        let mut host = host();
        let mut modal = Modal::mount(&mut host, &doc_modal()).unwrap();
        let open = |modal: &mut Modal<usize>, host: &mut SimHost| {
            modal.on_click(host, &0, ClickPoint { x: 500.0, y: 0.0 });
            assert!(modal.is_open());
        };

        open(&mut modal, &mut host);
        modal.on_click(&mut host, &2, ClickPoint::default());
        assert!(!modal.is_open());
        assert!(!host.scroll_locked());
        assert_eq!(host.element(1).display.as_deref(), Some("none"));

        open(&mut modal, &mut host);
        modal.on_click(&mut host, &1, ClickPoint::default());
        assert!(!modal.is_open());

        open(&mut modal, &mut host);
        assert!(!modal.on_key(&mut host, "Enter"));
        assert!(modal.on_key(&mut host, "Escape"));
        assert!(!modal.is_open());
        assert!(!modal.on_key(&mut host, "Escape"));
    }

    #[test]
    fn click_inside_content_does_not_close() {
        let mut host = host();
        let content = host.add(SimElement::new().class("modal-body").child_of(1));
        let mut modal = Modal::mount(&mut host, &doc_modal()).unwrap();
        modal.on_click(&mut host, &0, ClickPoint { x: 500.0, y: 0.0 });
        assert!(!modal.on_click(&mut host, &content, ClickPoint::default()));
        assert!(modal.is_open());
    }

    #[test]
    fn content_swap_rewrites_body() {
        let mut host = SimHost::new();
        host.add(SimElement::new().class("image-16"));
        let overlay = host.add(SimElement::new().id("modal"));
        let body = host.add(SimElement::new().class("modal-body").child_of(overlay));
        let unread = host.add(SimElement::new().class("unread-message").child_of(body));
        let spec = ModalSpec {
            name: "messages".into(),
            overlay: sel("#modal"),
            opener: Some(sel("image-16")),
            close: Some(sel("close")),
            open_region: OpenRegion::Whole,
            open_sound: None,
            content_swap: Some(ContentSwap {
                trigger: sel("unread-message"),
                body: sel("modal-body"),
                html: r#"<p class="question-text">Do you want to know more of the truth?</p>"#
                    .into(),
            }),
        };
        let mut modal = Modal::mount(&mut host, &spec).unwrap();
        assert_eq!(host.element(unread).styles.get("cursor").map(String::as_str), Some("pointer"));

        modal.on_click(&mut host, &0, ClickPoint::default());
        assert!(modal.is_open());
        modal.on_click(&mut host, &unread, ClickPoint::default());
        assert!(host.element(body).inner_html.contains("question-text"));
        assert!(modal.is_open());
    }

    #[test]
    fn missing_overlay_is_inert() {
        let mut host = SimHost::new();
        assert!(Modal::mount(&mut host, &doc_modal()).is_none());
    }
}
