//! Background loading of shader sources and textures.

use wasm_bindgen::{closure::Closure, JsCast, JsValue};
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::{Blob, IdleRequestOptions, ImageBitmap, RequestCache, RequestInit, Response, Window};

use super::render::SharedBackground;
use crate::config::BackgroundConfig;
use crate::error::{BackgroundError, Result};
use crate::shader::ShaderSources;

const SCENE_FRAGMENT: &str = "shader/blackhole_main.frag";
const TONEMAP_FRAGMENT: &str = "shader/tonemapping.frag";
const VERTEX: &str = "shader/simple.vert";
const GALAXY_IMAGE: &str = "assets/skybox_nebula_dark/equirect.png";
const COLOR_MAP_IMAGE: &str = "assets/color_map.png";

/// An in-flight GET. The browser starts the request immediately, so several
/// of these run concurrently even when awaited one after another.
struct PendingFetch {
    url: String,
    response: js_sys::Promise,
}

impl PendingFetch {
    fn start(window: &Window, url: String) -> Self {
        let init = RequestInit::new();
        init.set_method("GET");
        init.set_cache(RequestCache::ForceCache);
        let response = window.fetch_with_str_and_init(&url, &init);
        Self { url, response }
    }

    async fn response(self) -> Result<(String, Response)> {
        let value = JsFuture::from(self.response).await?;
        let response: Response = value.dyn_into()?;
        if !response.ok() {
            return Err(BackgroundError::AssetFetch {
                url: self.url,
                status: response.status(),
            });
        }
        Ok((self.url, response))
    }

    async fn text(self) -> Result<String> {
        let (url, response) = self.response().await?;
        JsFuture::from(response.text()?)
            .await?
            .as_string()
            .ok_or(BackgroundError::AssetDecode { url })
    }

    async fn image(self, window: &Window) -> Result<ImageBitmap> {
        let (url, response) = self.response().await?;
        let blob: Blob = JsFuture::from(response.blob()?).await?.dyn_into()?;
        let decode = window.create_image_bitmap_with_blob(&blob)?;
        match JsFuture::from(decode).await {
            Ok(bitmap) => Ok(bitmap.dyn_into()?),
            Err(_) => Err(BackgroundError::AssetDecode { url }),
        }
    }
}

pub async fn load_shader_sources(window: &Window, config: &BackgroundConfig) -> Result<ShaderSources> {
    let scene = PendingFetch::start(window, config.asset_url(SCENE_FRAGMENT));
    let tone = PendingFetch::start(window, config.asset_url(TONEMAP_FRAGMENT));
    let vertex = PendingFetch::start(window, config.asset_url(VERTEX));
    Ok(ShaderSources {
        scene_fragment: scene.text().await?,
        tonemap_fragment: tone.text().await?,
        vertex: vertex.text().await?,
    })
}

pub struct SceneImages {
    pub galaxy: ImageBitmap,
    pub color_map: ImageBitmap,
}

pub async fn load_images(window: &Window, config: &BackgroundConfig) -> Result<SceneImages> {
    let galaxy = PendingFetch::start(window, config.asset_url(GALAXY_IMAGE));
    let color_map = PendingFetch::start(window, config.asset_url(COLOR_MAP_IMAGE));
    Ok(SceneImages {
        galaxy: galaxy.image(window).await?,
        color_map: color_map.image(window).await?,
    })
}

/// Queue asset loading for when the page is idle, bounded by
/// `idle_load_timeout_ms`; fall back to a plain timeout where idle
/// callbacks are unsupported.
pub fn schedule_load(background: SharedBackground, config: BackgroundConfig) -> Result<()> {
    let window = web_sys::window().ok_or(BackgroundError::Js("no window".into()))?;
    let idle_timeout = config.idle_load_timeout_ms;
    let fallback_delay = config.fallback_load_delay_ms;
    let task = Closure::once_into_js(move || spawn_local(load_all(background, config)));

    let has_idle = js_sys::Reflect::has(&window, &JsValue::from_str("requestIdleCallback")).unwrap_or(false);
    if has_idle {
        let options = IdleRequestOptions::new();
        options.set_timeout(idle_timeout);
        window.request_idle_callback_with_options(task.unchecked_ref(), &options)?;
    } else {
        window.set_timeout_with_callback_and_timeout_and_arguments_0(task.unchecked_ref(), fallback_delay)?;
    }
    Ok(())
}

async fn load_all(background: SharedBackground, config: BackgroundConfig) {
    let Some(window) = web_sys::window() else {
        return;
    };

    let sources = match load_shader_sources(&window, &config).await {
        Ok(sources) => sources,
        Err(err) => {
            log::error!("shader load failed: {}", err);
            background.borrow_mut().report(&err);
            return;
        }
    };
    let installed = background.borrow_mut().install_sources(sources);
    if let Err(err) = installed {
        background.borrow_mut().report(&err);
        return;
    }

    match load_images(&window, &config).await {
        Ok(images) => {
            let uploaded = background.borrow_mut().install_images(&images);
            if let Err(err) = uploaded {
                log::error!("texture upload failed: {}", err);
            }
        }
        Err(err) => log::error!("texture load failed: {}", err),
    }
}
