use crate::error::AssetError;

pub fn is_remote(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Resolves `uri` (as written inside a document) against the document's own URL.
pub fn resolve(base_url: &str, uri: &str) -> String {
    if is_remote(uri) || uri.starts_with('/') || uri.starts_with("data:") {
        return uri.to_owned();
    }
    match base_url.rfind('/') {
        Some(slash) => format!("{}{}", &base_url[..=slash], uri),
        None => uri.to_owned(),
    }
}

/// Fetches the full body of `url`: HTTP(S) over the network, anything else from disk.
#[cfg(not(target_arch = "wasm32"))]
pub async fn fetch_bytes(url: &str) -> Result<Vec<u8>, AssetError> {
    use std::io::Read;

    if is_remote(url) {
        let response = ureq::get(url).call().map_err(|err| match err {
            ureq::Error::Status(status, _) => AssetError::Status { url: url.to_owned(), status },
            other => AssetError::Fetch { url: url.to_owned(), reason: other.to_string() },
        })?;
        let mut bytes = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut bytes)
            .map_err(|source| AssetError::Io { path: url.to_owned(), source })?;
        Ok(bytes)
    } else {
        let path = urlencoding::decode(url)
            .map_err(|err| AssetError::Fetch { url: url.to_owned(), reason: err.to_string() })?;
        std::fs::read(path.as_ref()).map_err(|source| AssetError::Io { path: url.to_owned(), source })
    }
}

/// Fetches the full body of `url` through the browser's `fetch`.
#[cfg(target_arch = "wasm32")]
pub async fn fetch_bytes(url: &str) -> Result<Vec<u8>, AssetError> {
    use wasm_bindgen::JsCast;
    use wasm_bindgen_futures::JsFuture;

    let js_error = |err: wasm_bindgen::JsValue| AssetError::Fetch {
        url: url.to_owned(),
        reason: format!("{err:?}"),
    };

    let window = web_sys::window().ok_or_else(|| AssetError::Fetch {
        url: url.to_owned(),
        reason: "no window".to_owned(),
    })?;
    let response: web_sys::Response = JsFuture::from(window.fetch_with_str(url))
        .await
        .map_err(js_error)?
        .dyn_into()
        .map_err(js_error)?;
    if !response.ok() {
        return Err(AssetError::Status { url: url.to_owned(), status: response.status() });
    }
    let buffer = JsFuture::from(response.array_buffer().map_err(js_error)?)
        .await
        .map_err(js_error)?;
    Ok(js_sys::Uint8Array::new(&buffer).to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_relative_to_document_directory() {
        assert_eq!(resolve("./texture/DamagedHelmet.gltf", "DamagedHelmet.bin"), "./texture/DamagedHelmet.bin");
        assert_eq!(
            resolve("https://host/models/a.gltf", "tex/albedo.jpg"),
            "https://host/models/tex/albedo.jpg"
        );
        assert_eq!(resolve("model.gltf", "model.bin"), "model.bin");
    }

    #[test]
    fn absolute_and_data_uris_pass_through() {
        assert_eq!(resolve("./a/b.gltf", "https://cdn/x.bin"), "https://cdn/x.bin");
        assert_eq!(resolve("./a/b.gltf", "data:application/octet-stream;base64,AA=="), "data:application/octet-stream;base64,AA==");
    }

    #[test]
    fn missing_local_file_is_io_error() {
        let result = pollster::block_on(fetch_bytes("./definitely/not/here.gltf"));
        assert!(matches!(result, Err(AssetError::Io { .. })));
    }
}
