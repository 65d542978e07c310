#![cfg(target_arch = "wasm32")]

use glam::DVec2;
use js_sys::{Float64Array, Uint8Array};
use log::{debug, info};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::{window, Response};

use crate::app::artifact_lifecycle;
use crate::{Lifecycle, LoadError, Loader, ModuleHandle, ResourceHandle, Scenario, Simulation};

#[wasm_bindgen(start)]
pub fn bootstrap() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

/// Registers the loader as the page's content-ready entry point.
///
/// The wasm module usually finishes initialising after `DOMContentLoaded`
/// has already fired, so the entry point runs immediately unless the
/// document is still loading.
#[wasm_bindgen]
pub fn register_loader(module_url: String, resource_url: String) -> Result<(), JsValue> {
    let window = window().ok_or_else(|| JsValue::from_str("window not available"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("document not available"))?;

    let loader = Loader::new(
        move || fetch_module(module_url.clone()),
        move || fetch_resource(resource_url.clone()),
    );
    let lifecycle = artifact_lifecycle(loader, |line| info!("{line}"));
    let fire = move || spawn_local(signal_content_ready(lifecycle));

    if document.ready_state() == "loading" {
        let on_ready = Closure::once_into_js(fire);
        document.add_event_listener_with_callback("DOMContentLoaded", on_ready.unchecked_ref())
    } else {
        debug!("document already parsed; running entry point now");
        fire();
        Ok(())
    }
}

async fn signal_content_ready(mut lifecycle: Lifecycle) {
    let dispatch = lifecycle.signal_content_ready().await;
    debug!("content-ready dispatch finished: {dispatch:?}");
}

async fn fetch_module(url: String) -> Result<ModuleHandle, LoadError> {
    let bytes = fetch_bytes(&url).await?;
    ModuleHandle::from_bytes(url, bytes)
}

async fn fetch_resource(url: String) -> Result<ResourceHandle, LoadError> {
    let bytes = fetch_bytes(&url).await?;
    ResourceHandle::from_bytes(url, bytes)
}

async fn fetch_bytes(url: &str) -> Result<Vec<u8>, LoadError> {
    let rejected = |err: JsValue| LoadError::rejected(url, format!("{err:?}"));
    let window = window().ok_or_else(|| LoadError::rejected(url, "window not available"))?;
    let response = JsFuture::from(window.fetch_with_str(url))
        .await
        .map_err(rejected)?
        .dyn_into::<Response>()
        .map_err(|_| LoadError::rejected(url, "fetch did not return a Response"))?;
    if !response.ok() {
        return Err(LoadError::rejected(
            url,
            format!("HTTP status {}", response.status()),
        ));
    }
    let buffer = JsFuture::from(response.array_buffer().map_err(rejected)?)
        .await
        .map_err(rejected)?;
    Ok(Uint8Array::new(&buffer).to_vec())
}

/// Four-body simulation driven from JavaScript.
#[wasm_bindgen]
pub struct WasmSimulation {
    inner: Simulation,
}

#[wasm_bindgen]
impl WasmSimulation {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<WasmSimulation, JsValue> {
        let simulation = Simulation::from_scenario(&Scenario::four_body())
            .map_err(|err| JsValue::from_str(&err.to_string()))?;
        Ok(Self { inner: simulation })
    }

    /// Builds a simulation from scenario XML.
    pub fn from_xml(xml: &str) -> Result<WasmSimulation, JsValue> {
        let scenario = Scenario::from_xml(xml)
            .map_err(|err| JsValue::from_str(&format!("failed to parse scenario: {err}")))?;
        let simulation = Simulation::from_scenario(&scenario)
            .map_err(|err| JsValue::from_str(&err.to_string()))?;
        Ok(Self { inner: simulation })
    }

    pub fn step(&self, count: u32) -> f64 {
        self.inner.step(u64::from(count));
        self.inner.elapsed()
    }

    /// Flattened `[x0, y0, x1, y1, ...]` positions in body order.
    pub fn positions(&self) -> Float64Array {
        let flat: Vec<f64> = self
            .inner
            .snapshot()
            .bodies()
            .iter()
            .flat_map(|body| {
                let DVec2 { x, y } = body.position;
                [x, y]
            })
            .collect();
        Float64Array::from(flat.as_slice())
    }

    pub fn names(&self) -> Vec<JsValue> {
        self.inner
            .snapshot()
            .bodies()
            .iter()
            .map(|body| JsValue::from_str(&body.name))
            .collect()
    }

    pub fn total_energy(&self) -> f64 {
        self.inner.snapshot().total_energy()
    }
}
