//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;

use bytes::Bytes;
use image::{ImageFormat, Rgba, RgbaImage};
use parking_lot::Mutex;

use topokort::coord::LonLat;
use topokort::provider::{BasicAuth, HttpClient, HttpError};
use topokort::track::Track;

/// Capabilities document with a single UTM33 tile matrix set.
pub const CAPABILITIES: &str = r#"<?xml version="1.0"?>
<Capabilities xmlns="http://www.opengis.net/wmts/1.0" xmlns:ows="http://www.opengis.net/ows/1.1">
  <Contents>
    <TileMatrixSet>
      <ows:Identifier>utm33n</ows:Identifier>
      <TileMatrix>
        <ows:Identifier>0</ows:Identifier>
        <ScaleDenominator>71428.57142857143</ScaleDenominator>
        <TopLeftCorner>-2500000.0 9045984.0</TopLeftCorner>
        <TileWidth>256</TileWidth><TileHeight>256</TileHeight>
      </TileMatrix>
      <TileMatrix>
        <ows:Identifier>1</ows:Identifier>
        <ScaleDenominator>35714.28571428572</ScaleDenominator>
        <TopLeftCorner>-2500000.0 9045984.0</TopLeftCorner>
        <TileWidth>256</TileWidth><TileHeight>256</TileHeight>
      </TileMatrix>
    </TileMatrixSet>
  </Contents>
</Capabilities>"#;

type Responder = dyn Fn(&str) -> Result<Bytes, HttpError> + Send + Sync;

/// In-memory HTTP client that records every requested URL.
#[derive(Clone)]
pub struct FakeMapServer {
    responder: Arc<Responder>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeMapServer {
    pub fn new(responder: impl Fn(&str) -> Result<Bytes, HttpError> + Send + Sync + 'static) -> Self {
        Self {
            responder: Arc::new(responder),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Serves the capabilities document and one solid tile for every other
    /// request.
    pub fn solid(rgba: [u8; 4]) -> Self {
        let tile = solid_png(256, 256, rgba);
        Self::new(move |url| {
            if url.ends_with("WMTSCapabilities.xml") {
                Ok(Bytes::from_static(CAPABILITIES.as_bytes()))
            } else {
                Ok(tile.clone())
            }
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

impl HttpClient for FakeMapServer {
    async fn get(&self, url: &str, _auth: Option<&BasicAuth>) -> Result<Bytes, HttpError> {
        self.calls.lock().push(url.to_string());
        (self.responder)(url)
    }
}

pub fn solid_png(width: u32, height: u32, rgba: [u8; 4]) -> Bytes {
    let img = RgbaImage::from_pixel(width, height, Rgba(rgba));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    Bytes::from(buf.into_inner())
}

pub fn status_error(url: &str, status: u16) -> HttpError {
    HttpError::Status {
        status,
        url: url.to_string(),
        retry_after: None,
    }
}

/// An east-west track of about 50 km near Trondheim, in UTM zone 33.
pub fn trondheim_track() -> Track {
    let points = (0..=100)
        .map(|i| LonLat::new(13.5 + i as f64 * 0.01, 63.4 + (i as f64 * 0.1).sin() * 0.01))
        .collect();
    Track::new(points)
}
