//! Browser bindings.
//!
//! Build with: `wasm-pack build --target web --features wasm`, then call
//! `mount()` once the document is ready. Pass a story object to override the
//! built-in narrative.

mod console;
mod host;

use std::cell::RefCell;

use tracing::{debug, Level};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, KeyboardEvent, MouseEvent, Window};

use crate::modal::ClickPoint;
use crate::stage::Stage;
use crate::story::Story;

pub use host::WebHost;

/// DOM listeners already installed. Listeners look the stage up on every
/// event, so a later `mount` only swaps the stage and must not add more.
#[derive(Debug)]
struct Listeners<N> {
    page: bool,
    hovered: Vec<N>,
}

impl<N: PartialEq> Listeners<N> {
    const fn new() -> Self {
        Self {
            page: false,
            hovered: Vec::new(),
        }
    }

    fn needs_hover(&self, node: &N) -> bool {
        !self.hovered.contains(node)
    }
}

thread_local! {
    static STAGE: RefCell<Option<Stage<WebHost>>> = const { RefCell::new(None) };
    static LISTENERS: RefCell<Listeners<Element>> = const { RefCell::new(Listeners::new()) };
}

/// Run `f` against the mounted stage. Events that arrive before mounting,
/// or while the stage is already handling one, are dropped.
pub(crate) fn with_stage<R>(f: impl FnOnce(&mut Stage<WebHost>) -> R) -> Option<R> {
    STAGE.with(|cell| match cell.try_borrow_mut() {
        Ok(mut slot) => slot.as_mut().map(f),
        Err(_) => {
            debug!("stage busy, event dropped");
            None
        }
    })
}

fn js_err(e: impl std::fmt::Display) -> JsError {
    JsError::new(&e.to_string())
}

/// Mount the engine on the current document.
#[wasm_bindgen]
pub fn mount(story: JsValue) -> Result<(), JsError> {
    console::init(Level::INFO);

    let story = if story.is_undefined() || story.is_null() {
        Story::narrative().map_err(js_err)?
    } else {
        let story: Story = serde_wasm_bindgen::from_value(story).map_err(js_err)?;
        story.validate().map_err(js_err)?;
        story
    };
    for warning in story.warnings() {
        tracing::warn!("{warning}");
    }

    let host = WebHost::new().map_err(|e| JsError::new(&format!("{e:?}")))?;
    let window = host.window().clone();
    let document = host.document().clone();

    let stage = Stage::mount(host, &story).map_err(js_err)?;
    let hover = stage.hover_target().cloned();
    let replaced = STAGE.with(|cell| cell.borrow_mut().replace(stage).is_some());
    if replaced {
        debug!("stage replaced");
    }

    if !LISTENERS.with(|l| l.borrow().page) {
        listen_page(&window, &document)?;
        LISTENERS.with(|l| l.borrow_mut().page = true);
    }
    if let Some(image) = hover {
        if LISTENERS.with(|l| l.borrow().needs_hover(&image)) {
            listen_hover(&image)?;
            LISTENERS.with(|l| l.borrow_mut().hovered.push(image));
        }
    }

    Ok(())
}

fn listen_page(window: &Window, document: &Document) -> Result<(), JsError> {
    {
        let closure = Closure::wrap(Box::new(move || {
            with_stage(|stage| stage.scroll());
        }) as Box<dyn FnMut()>);
        window
            .add_event_listener_with_callback("scroll", closure.as_ref().unchecked_ref())
            .map_err(|e| JsError::new(&format!("{e:?}")))?;
        closure.forget();
    }

    {
        let closure = Closure::wrap(Box::new(move |evt: MouseEvent| {
            let Some(target) = evt.target().and_then(|t| t.dyn_into::<Element>().ok()) else {
                return;
            };
            let point = ClickPoint {
                x: f64::from(evt.client_x()),
                y: f64::from(evt.client_y()),
            };
            if with_stage(|stage| stage.click(&target, point)) == Some(true) {
                evt.prevent_default();
            }
        }) as Box<dyn FnMut(_)>);
        document
            .add_event_listener_with_callback("click", closure.as_ref().unchecked_ref())
            .map_err(|e| JsError::new(&format!("{e:?}")))?;
        closure.forget();
    }

    let closure = Closure::wrap(Box::new(move |evt: KeyboardEvent| {
        with_stage(|stage| stage.key(&evt.key()));
    }) as Box<dyn FnMut(_)>);
    document
        .add_event_listener_with_callback("keydown", closure.as_ref().unchecked_ref())
        .map_err(|e| JsError::new(&format!("{e:?}")))?;
    closure.forget();
    Ok(())
}

fn listen_hover(image: &Element) -> Result<(), JsError> {
    let moved = image.clone();
    let closure = Closure::wrap(Box::new(move |evt: MouseEvent| {
        let (x, y) = (f64::from(evt.client_x()), f64::from(evt.client_y()));
        with_stage(|stage| stage.mouse_move(&moved, x, y));
    }) as Box<dyn FnMut(_)>);
    image
        .add_event_listener_with_callback("mousemove", closure.as_ref().unchecked_ref())
        .map_err(|e| JsError::new(&format!("{e:?}")))?;
    closure.forget();

    let left = image.clone();
    let closure = Closure::wrap(Box::new(move |_evt: MouseEvent| {
        with_stage(|stage| stage.mouse_leave(&left));
    }) as Box<dyn FnMut(_)>);
    image
        .add_event_listener_with_callback("mouseleave", closure.as_ref().unchecked_ref())
        .map_err(|e| JsError::new(&format!("{e:?}")))?;
    closure.forget();
    Ok(())
}

/// Run a named play shortcut (`playAudio`, `playVid`, ...). Returns false if
/// the name is unknown or its element is missing.
#[wasm_bindgen]
pub fn play(name: &str) -> bool {
    with_stage(|stage| stage.play_shortcut(name)).unwrap_or(false)
}

/// Validate a story object without mounting it.
///
/// Returns a JS object with:
/// - `valid`: boolean
/// - `error`: string (only if invalid)
/// - `warnings`: string[] (only if valid)
/// - `rules`: number (only if valid)
#[wasm_bindgen]
pub fn validate(story: JsValue) -> JsValue {
    let result = serde_wasm_bindgen::from_value::<Story>(story)
        .map_err(|e| e.to_string())
        .and_then(|story| story.validate().map(|()| story).map_err(|e| e.to_string()));

    let obj = js_sys::Object::new();
    match result {
        Ok(story) => {
            let _ = js_sys::Reflect::set(&obj, &"valid".into(), &JsValue::TRUE);
            let warnings = js_sys::Array::new();
            for w in story.warnings() {
                warnings.push(&JsValue::from_str(&w));
            }
            let _ = js_sys::Reflect::set(&obj, &"warnings".into(), &warnings.into());
            let _ = js_sys::Reflect::set(
                &obj,
                &"rules".into(),
                &JsValue::from_f64(story.rules.len() as f64),
            );
        }
        Err(e) => {
            let _ = js_sys::Reflect::set(&obj, &"valid".into(), &JsValue::FALSE);
            let _ = js_sys::Reflect::set(&obj, &"error".into(), &JsValue::from_str(&e));
        }
    }
    obj.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remount_installs_nothing_new() {
        let mut listeners: Listeners<usize> = Listeners::new();
        assert!(!listeners.page);
        listeners.page = true;
        assert!(listeners.page);

        assert!(listeners.needs_hover(&7));
        listeners.hovered.push(7);
        assert!(!listeners.needs_hover(&7));
        assert!(listeners.needs_hover(&8));
    }
}
