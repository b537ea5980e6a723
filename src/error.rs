use thiserror::Error;

/// Failures of the one-shot asset fetch-and-decode path.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("request for {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("failed to read {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid glTF document")]
    Gltf(#[from] gltf::Error),

    #[error("failed to decode image")]
    Image(#[from] image::ImageError),

    #[error("invalid data URI")]
    DataUri(#[from] base64::DecodeError),

    #[error("glTF buffer {0} has no data")]
    MissingBuffer(usize),

    #[error("mesh primitive has no {0} attribute")]
    MissingAttribute(&'static str),

    #[error("unsupported glTF content: {0}")]
    Unsupported(String),
}

/// Failures while bringing up the GPU side.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to create surface")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),

    #[error("no suitable GPU adapter")]
    RequestAdapter(#[from] wgpu::RequestAdapterError),

    #[error("failed to create device")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("surface reports no supported formats")]
    NoSurfaceFormat,
}
