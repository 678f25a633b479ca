//! Map tile providers
//!
//! This module describes the national mapping agencies the renderer can
//! draw from, how their tiles are addressed, and the HTTP client used to
//! fetch them.
//!
//! # Example
//!
//! ```ignore
//! use topokort::provider::{Credentials, ProviderRegistry, ReqwestClient};
//!
//! let registry = ProviderRegistry::nordic(&Credentials::from_env());
//! let client = ReqwestClient::new()?;
//! ```

mod http;
mod registry;
mod types;
mod wms;

pub use http::{parse_retry_after, BasicAuth, HttpClient, HttpError, ReqwestClient};
pub use registry::{Credentials, ProviderRegistry, DEFAULT_MAX_ZOOM};
pub use types::{
    xyz_url, Auth, GeoBounds, MatrixSet, NativeMatrixSource, Provider, ProviderId, TileSource,
    WebMercatorSource,
};
pub use wms::{GetMapRequest, OverlayKind};

#[cfg(test)]
pub use http::tests::{solid_png, status_error, MockHttpClient};
