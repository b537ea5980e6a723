mod environment;
mod fetch;
mod model;

use std::future::Future;

pub use environment::{EnvironmentLevel, EnvironmentMap, decode_hdr};
pub use fetch::{fetch_bytes, is_remote, resolve};
pub use model::{decode_document, decode_model, generate_normals, load_model};

use crate::error::AssetError;
use crate::scene::ModelData;

/// Completion of one of the one-shot startup loads.
#[derive(Debug)]
pub enum AssetEvent {
    Environment(Result<EnvironmentMap, AssetError>),
    Model(Result<ModelData, AssetError>),
}

pub async fn load_environment(url: &str) -> Result<EnvironmentMap, AssetError> {
    let bytes = fetch_bytes(url).await?;
    decode_hdr(&bytes)
}

/// Starts both loads. `on_complete` runs once per load, off the caller's stack.
pub fn spawn_startup_loads<F>(environment_url: String, model_url: String, on_complete: F)
where
    F: Fn(AssetEvent) + Clone + wgpu::WasmNotSend + 'static,
{
    let notify = on_complete.clone();
    spawn_task("environment", async move {
        log::info!("Loading environment from {environment_url}");
        let result = load_environment(&environment_url).await;
        notify(AssetEvent::Environment(result));
    });

    spawn_task("model", async move {
        log::info!("Loading model from {model_url}");
        let result = load_model(&model_url).await;
        on_complete(AssetEvent::Model(result));
    });
}

#[cfg(not(target_arch = "wasm32"))]
fn spawn_task<T>(name: &str, task: T)
where
    T: Future<Output = ()> + Send + 'static,
{
    let spawned = std::thread::Builder::new()
        .name(format!("{name}-loader"))
        .spawn(move || pollster::block_on(task));
    if let Err(err) = spawned {
        log::error!("Couldn't start {name} loader: {err}");
    }
}

#[cfg(target_arch = "wasm32")]
fn spawn_task<T>(_name: &str, task: T)
where
    T: Future<Output = ()> + 'static,
{
    wasm_bindgen_futures::spawn_local(task);
}
