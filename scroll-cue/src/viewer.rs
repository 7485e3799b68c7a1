//! Document viewer: hovering quadrants of an image swaps in document pages
//! and mirrors the page in a floating side panel.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::host::Host;
use crate::selector::Selector;

/// Which document page a pointer position selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocPage {
    /// Top-left quadrant.
    First,
    /// Bottom-left quadrant.
    Second,
    /// Right half.
    Third,
}

impl DocPage {
    /// `rel_x`, `rel_y` are the pointer position as fractions of the image size.
    pub fn locate(rel_x: f64, rel_y: f64) -> Self {
        match (rel_x < 0.5, rel_y < 0.5) {
            (true, true) => DocPage::First,
            (true, false) => DocPage::Second,
            (false, _) => DocPage::Third,
        }
    }

    fn index(self) -> usize {
        match self {
            DocPage::First => 0,
            DocPage::Second => 1,
            DocPage::Third => 2,
        }
    }
}

fn default_panel() -> Selector {
    Selector::class("floating-docs-container")
}

fn default_hover_width() -> String {
    "1200px".to_string()
}

fn default_panel_css() -> String {
    "position: absolute; top: 112%; right: -8%; width: 1000px; height: 750px; \
     z-index: 1000; opacity: 0; transition: opacity 0.3s ease-in-out; pointer-events: none;"
        .to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ViewerSpec {
    pub image: Selector,
    /// Image shown in place of the original, per quadrant.
    pub pages: [String; 3],
    /// Image shown in the floating panel, per quadrant.
    pub panel_pages: [String; 3],
    #[serde(default = "default_panel")]
    pub panel: Selector,
    #[serde(default = "default_panel_css")]
    pub panel_css: String,
    #[serde(default = "default_hover_width")]
    pub hover_width: String,
}

#[derive(Debug)]
pub struct DocumentViewer<N> {
    spec: ViewerSpec,
    image: N,
    panel: N,
    original_src: Option<String>,
    showing: Option<DocPage>,
}

impl<N: Clone + PartialEq + fmt::Debug> DocumentViewer<N> {
    /// `None` when the image is not on the page.
    pub fn mount<H: Host<Node = N>>(host: &mut H, spec: &ViewerSpec) -> Option<Self> {
        let Some(image) = host.query(&spec.image) else {
            warn!(image = %spec.image, "document viewer image not found");
            return None;
        };
        let Some(panel) = host.ensure_element(&spec.panel, &spec.panel_css) else {
            warn!(panel = %spec.panel, "document panel could not be created");
            return None;
        };
        info!(image = %spec.image, "document viewer ready");

        let original_src = host.src(&image);
        for url in &spec.pages {
            host.preload(url);
        }

        Some(Self {
            spec: spec.clone(),
            image,
            panel,
            original_src,
            showing: None,
        })
    }

    pub fn image(&self) -> &N {
        &self.image
    }

    /// Pointer moved over the image at client coordinates `(x, y)`.
    pub fn on_mouse_move<H: Host<Node = N>>(&mut self, host: &mut H, x: f64, y: f64) {
        let rect = host.bounding_rect(&self.image);
        if rect.width <= 0.0 || rect.height <= 0.0 {
            return;
        }
        let page = DocPage::locate((x - rect.left) / rect.width, (y - rect.top) / rect.height);

        host.set_style(&self.image, "width", &self.spec.hover_width);
        host.set_style(&self.image, "object-fit", "fill");

        if self.showing != Some(page) {
            debug!(?page, "switching document page");
        }
        let i = page.index();
        host.set_src(&self.image, &self.spec.pages[i]);
        host.set_inner_html(
            &self.panel,
            &format!(
                "<img src=\"{}\" style=\"width: 100%; height: 100%; object-fit: contain; \
                 border-radius: 10px; box-shadow: 0 4px 20px rgba(255,255,255,0.3);\">",
                self.spec.panel_pages[i]
            ),
        );
        host.set_style(&self.panel, "opacity", "1");
        self.showing = Some(page);
    }

    /// Restore the original image and hide the panel.
    pub fn on_mouse_leave<H: Host<Node = N>>(&mut self, host: &mut H) {
        if let Some(src) = &self.original_src {
            host.set_src(&self.image, src);
        }
        for property in ["border", "width", "height", "object-fit", "object-position"] {
            host.set_style(&self.image, property, "");
        }
        host.set_style(&self.panel, "opacity", "0");
        self.showing = None;
    }

    pub fn showing(&self) -> Option<DocPage> {
        self.showing
    }
}
