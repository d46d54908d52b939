//! Browser implementations of the platform seams

use crate::{MediaBackend, PlaybackError, Result, SettingsStorage};
use js_sys::{Function, Promise, Reflect};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{HtmlAudioElement, Storage};

type RejectionHandler = Closure<dyn FnMut(JsValue, JsValue)>;

/// [`MediaBackend`] over an `<audio>` element
///
/// The host attaches the element's DOM listeners and forwards them to
/// `WasmPlayer::handleMediaEvent`. Asynchronous `play()` refusals are routed
/// to `on_rejected(channel, src, error)` when set.
pub struct HtmlAudioBackend {
    element: HtmlAudioElement,
    on_rejected: Option<RejectionHandler>,
}

impl HtmlAudioBackend {
    pub fn new(element: HtmlAudioElement) -> Self {
        element.set_preload("auto");
        Self {
            element,
            on_rejected: None,
        }
    }

    /// Report asynchronous `play()` refusals for `channel` to `callback`
    ///
    /// One handler lives as long as the backend; each play binds the source
    /// it was issued for.
    pub fn with_rejection_handler(mut self, channel: u8, callback: Function) -> Self {
        let handler = Closure::<dyn FnMut(JsValue, JsValue)>::new(move |src: JsValue, error: JsValue| {
            callback
                .call3(&JsValue::NULL, &JsValue::from(channel), &src, &error)
                .ok();
        });
        self.on_rejected = Some(handler);
        self
    }
}

impl MediaBackend for HtmlAudioBackend {
    fn set_source(&mut self, url: &str) {
        self.element.set_src(url);
        self.element.load();
    }

    fn clear_source(&mut self) {
        self.element.pause().ok();
        self.element.remove_attribute("src").ok();
        self.element.load();
    }

    fn play(&mut self) -> Result<()> {
        let promise = self
            .element
            .play()
            .map_err(|e| PlaybackError::PlaybackRejected(describe(&e)))?;

        if let Some(handler) = &self.on_rejected {
            let handler: &Function = handler.as_ref().unchecked_ref();
            let report = handler.bind1(&JsValue::NULL, &JsValue::from_str(&self.element.src()));
            catch_with(&promise, &report);
        }

        Ok(())
    }

    fn pause(&mut self) {
        self.element.pause().ok();
    }

    fn set_position(&mut self, seconds: f64) {
        self.element.set_current_time(seconds);
    }

    fn set_volume(&mut self, volume: f32) {
        self.element.set_volume(f64::from(volume));
    }
}

/// [`SettingsStorage`] over `window.sessionStorage`
pub struct SessionStorage {
    storage: Storage,
}

impl SessionStorage {
    /// `None` when session storage is unavailable (private mode, sandboxed frames)
    pub fn open() -> Option<Self> {
        let storage = web_sys::window()?.session_storage().ok()??;
        Some(Self { storage })
    }
}

impl SettingsStorage for SessionStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.storage.get_item(key).ok().flatten()
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        self.storage
            .set_item(key, value)
            .map_err(|e| PlaybackError::Storage(describe(&e)))
    }
}

/// `promise.catch(handler)` with a plain function
fn catch_with(promise: &Promise, handler: &Function) {
    let Ok(catch) = Reflect::get(promise, &JsValue::from_str("catch")) else {
        return;
    };
    if let Some(catch) = catch.dyn_ref::<Function>() {
        catch.call1(promise, handler).ok();
    }
}

fn describe(value: &JsValue) -> String {
    value
        .as_string()
        .unwrap_or_else(|| format!("{:?}", value))
}
