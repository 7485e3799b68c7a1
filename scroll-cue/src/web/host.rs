//! [`Host`] over the live DOM.

use std::time::Duration;

use js_sys::Array;
use tracing::{debug, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    Document, Element, HtmlAudioElement, HtmlElement, HtmlImageElement, HtmlMediaElement,
    IntersectionObserver, IntersectionObserverEntry, IntersectionObserverInit, ScrollBehavior,
    ScrollToOptions, Window,
};

use crate::host::{
    DisplayStyle, Host, IntersectionEntry, ObserverKey, ObserverSpec, PlayCue, PlaybackError, Rect,
    TimerHandle, TimerKey,
};
use crate::selector::{Selector, SimpleSelector};

use super::with_stage;

pub struct WebHost {
    window: Window,
    document: Document,
    /// Kept alive for the page lifetime.
    observers: Vec<IntersectionObserver>,
}

impl WebHost {
    pub fn new() -> Result<Self, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let document = window.document().ok_or_else(|| JsValue::from_str("no document"))?;
        Ok(Self {
            window,
            document,
            observers: Vec::new(),
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    fn style_of(node: &Element, property: &str, value: &str) {
        if let Some(el) = node.dyn_ref::<HtmlElement>() {
            if let Err(e) = el.style().set_property(property, value) {
                debug!(property, error = ?e, "style rejected");
            }
        }
    }
}

fn describe(err: &JsValue) -> String {
    err.dyn_ref::<js_sys::Error>()
        .map(|e| String::from(e.name()) + ": " + &String::from(e.message()))
        .or_else(|| err.as_string())
        .unwrap_or_else(|| format!("{err:?}"))
}

/// Await a `play()` promise and report rejection through the cue.
fn settle_play(promise: js_sys::Promise, cue: PlayCue) {
    wasm_bindgen_futures::spawn_local(async move {
        if let Err(e) = JsFuture::from(promise).await {
            if let Some(url) = cue.rejected(&PlaybackError(describe(&e))) {
                if let Some(window) = web_sys::window() {
                    let _ = window.open_with_url_and_target(url, "_blank");
                }
            }
        }
    });
}

impl Host for WebHost {
    type Node = Element;

    fn query_all(&self, selector: &Selector) -> Vec<Element> {
        let list = match self.document.query_selector_all(&selector.to_string()) {
            Ok(list) => list,
            Err(e) => {
                warn!(%selector, error = %describe(&e), "selector rejected by the document");
                return Vec::new();
            }
        };
        (0..list.length())
            .filter_map(|i| list.item(i))
            .filter_map(|node| node.dyn_into::<Element>().ok())
            .collect()
    }

    fn set_display(&mut self, node: &Element, display: &DisplayStyle) {
        Self::style_of(node, "display", display.as_str());
    }

    fn set_style(&mut self, node: &Element, property: &str, value: &str) {
        Self::style_of(node, property, value);
    }

    fn set_src(&mut self, node: &Element, url: &str) {
        let _ = node.set_attribute("src", url);
    }

    fn src(&self, node: &Element) -> Option<String> {
        match node.dyn_ref::<HtmlImageElement>() {
            Some(img) => Some(img.src()),
            None => node.get_attribute("src"),
        }
    }

    fn set_inner_html(&mut self, node: &Element, html: &str) {
        node.set_inner_html(html);
    }

    fn set_class(&mut self, node: &Element, class: &str, on: bool) {
        let list = node.class_list();
        let _ = if on { list.add_1(class) } else { list.remove_1(class) };
    }

    fn attribute(&self, node: &Element, name: &str) -> Option<String> {
        node.get_attribute(name)
    }

    fn contains(&self, ancestor: &Element, node: &Element) -> bool {
        ancestor.contains(Some(node.as_ref()))
    }

    fn ensure_element(&mut self, selector: &Selector, css: &str) -> Option<Element> {
        if let Some(existing) = self.query(selector) {
            return Some(existing);
        }
        let el = self.document.create_element("div").ok()?;
        let classes: Vec<&str> = selector.classes().collect();
        el.set_class_name(&classes.join(" "));
        for part in selector.parts() {
            if let SimpleSelector::Id(id) = part {
                el.set_id(id);
            }
        }
        let _ = el.set_attribute("style", css);
        if let Some(body) = self.document.body() {
            let _ = body.append_child(&el);
        }
        Some(el)
    }

    fn preload(&mut self, url: &str) {
        if let Ok(img) = HtmlImageElement::new() {
            img.set_src(url);
        }
    }

    fn lock_scroll(&mut self, locked: bool) {
        if let Some(body) = self.document.body() {
            let _ = body
                .style()
                .set_property("overflow", if locked { "hidden" } else { "auto" });
        }
    }

    fn scroll_offset(&self) -> f64 {
        self.document
            .document_element()
            .map(|root| root.scroll_top() as f64)
            .unwrap_or(0.0)
    }

    fn viewport_height(&self) -> f64 {
        self.window
            .inner_height()
            .ok()
            .and_then(|h| h.as_f64())
            .unwrap_or(0.0)
    }

    fn bounding_rect(&self, node: &Element) -> Rect {
        let r = node.get_bounding_client_rect();
        Rect {
            left: r.left(),
            top: r.top(),
            width: r.width(),
            height: r.height(),
        }
    }

    fn scroll_to(&mut self, offset: f64, smooth: bool) {
        let opts = ScrollToOptions::new();
        opts.set_top(offset);
        opts.set_behavior(if smooth { ScrollBehavior::Smooth } else { ScrollBehavior::Auto });
        self.window.scroll_to_with_scroll_to_options(&opts);
    }

    fn open_in_new_context(&mut self, url: &str) {
        if let Err(e) = self.window.open_with_url_and_target(url, "_blank") {
            warn!(url, error = %describe(&e), "could not open new window");
        }
    }

    fn pause(&mut self, node: &Element) {
        if let Some(media) = node.dyn_ref::<HtmlMediaElement>() {
            let _ = media.pause();
        }
    }

    fn rewind(&mut self, node: &Element) {
        if let Some(media) = node.dyn_ref::<HtmlMediaElement>() {
            media.set_current_time(0.0);
        }
    }

    fn play(&mut self, node: &Element, cue: PlayCue) {
        let Some(media) = node.dyn_ref::<HtmlMediaElement>() else {
            warn!(cue = %cue.label, "play target is not a media element");
            return;
        };
        match media.play() {
            Ok(promise) => settle_play(promise, cue),
            Err(e) => {
                if let Some(url) = cue.rejected(&PlaybackError(describe(&e))) {
                    self.open_in_new_context(url);
                }
            }
        }
    }

    fn play_url(&mut self, url: &str, cue: PlayCue) {
        match HtmlAudioElement::new_with_src(url).and_then(|audio| audio.play()) {
            Ok(promise) => settle_play(promise, cue),
            Err(e) => {
                cue.rejected(&PlaybackError(describe(&e)));
            }
        }
    }

    fn set_timeout(&mut self, delay: Duration, key: TimerKey) -> TimerHandle {
        let callback = Closure::once_into_js(move || {
            with_stage(|stage| stage.timer_fired(key));
        });
        let millis = i32::try_from(delay.as_millis()).unwrap_or(i32::MAX);
        let id = self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), millis)
            .unwrap_or(-1);
        TimerHandle(id as u64)
    }

    fn clear_timeout(&mut self, handle: TimerHandle) {
        self.window.clear_timeout_with_handle(handle.0 as i32);
    }

    fn observe(&mut self, node: &Element, spec: ObserverSpec, key: ObserverKey) {
        let on_entries = move |entries: Array, _observer: IntersectionObserver| {
            for entry in entries.iter() {
                let entry: IntersectionObserverEntry = entry.unchecked_into();
                let observed = IntersectionEntry {
                    ratio: entry.intersection_ratio(),
                    is_intersecting: entry.is_intersecting(),
                };
                with_stage(|stage| stage.intersection(key, observed));
            }
        };
        let callback =
            Closure::wrap(Box::new(on_entries) as Box<dyn FnMut(Array, IntersectionObserver)>);

        let init = IntersectionObserverInit::new();
        init.set_threshold(&JsValue::from_f64(spec.threshold));
        init.set_root_margin(&format!("{}px", spec.root_margin_px));

        match IntersectionObserver::new_with_options(callback.as_ref().unchecked_ref(), &init) {
            Ok(observer) => {
                observer.observe(node);
                self.observers.push(observer);
                callback.forget();
            }
            Err(e) => warn!(?key, error = %describe(&e), "intersection observer unavailable"),
        }
    }
}
