//! Provider descriptors.

use std::fmt;
use std::str::FromStr;

use crate::coord::{Epsg, LonLat};

use super::http::BasicAuth;

/// National map provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProviderId {
    /// Norway (Kartverket)
    No,
    /// Sweden (Lantmäteriet)
    Se,
    /// Finland (Maanmittauslaitos)
    Fi,
}

impl ProviderId {
    /// All providers in resolution order.
    pub const ALL: [ProviderId; 3] = [ProviderId::No, ProviderId::Se, ProviderId::Fi];

    pub fn as_str(self) -> &'static str {
        match self {
            ProviderId::No => "no",
            ProviderId::Se => "se",
            ProviderId::Fi => "fi",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "no" => Ok(ProviderId::No),
            "se" => Ok(ProviderId::Se),
            "fi" => Ok(ProviderId::Fi),
            other => Err(format!("unknown provider '{other}'")),
        }
    }
}

/// Coarse geographic coverage of a provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl GeoBounds {
    pub fn contains(&self, p: LonLat) -> bool {
        (self.min_lat..=self.max_lat).contains(&p.lat) && (self.min_lon..=self.max_lon).contains(&p.lon)
    }
}

/// A WMTS tile-matrix set published in a UTM zone.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixSet {
    pub epsg: Epsg,
    pub id: String,
}

/// Pre-tiled source in UTM tile matrices, described by WMTS capabilities.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeMatrixSource {
    pub base_url: String,
    pub capabilities_url: String,
    pub layer: String,
    pub matrix_sets: Vec<MatrixSet>,
    /// Web Mercator template for border pages, `{z}`/`{x}`/`{y}` placeholders
    pub xyz_template: String,
}

impl NativeMatrixSource {
    /// Matrix-set id published for a zone, if any.
    pub fn matrix_set_for(&self, epsg: Epsg) -> Option<&str> {
        self.matrix_sets
            .iter()
            .find(|m| m.epsg == epsg)
            .map(|m| m.id.as_str())
    }

    /// GetTile URL for one tile of a matrix.
    pub fn tile_url(&self, matrix_set: &str, matrix: &str, row: i64, col: i64) -> String {
        format!(
            "{}/{}/default/{}/{}/{}/{}.png",
            self.base_url, self.layer, matrix_set, matrix, row, col
        )
    }
}

/// XYZ source in Web Mercator, `{layer}`/`{z}`/`{x}`/`{y}` placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct WebMercatorSource {
    pub url_template: String,
    pub layer: String,
}

/// How a provider's tiles are addressed. Resolved once per provider so the
/// fetch engine never branches on the provider id.
#[derive(Debug, Clone, PartialEq)]
pub enum TileSource {
    NativeMatrix(NativeMatrixSource),
    WebMercator(WebMercatorSource),
}

impl TileSource {
    /// XYZ URL template usable on border pages.
    pub fn xyz_template(&self) -> String {
        match self {
            TileSource::NativeMatrix(src) => src.xyz_template.clone(),
            TileSource::WebMercator(src) => src.url_template.replace("{layer}", &src.layer),
        }
    }
}

/// Fills an XYZ template.
pub fn xyz_url(template: &str, z: u8, x: u32, y: u32) -> String {
    template
        .replace("{z}", &z.to_string())
        .replace("{x}", &x.to_string())
        .replace("{y}", &y.to_string())
}

/// Request authentication for a provider.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Auth {
    #[default]
    None,
    /// HTTP basic auth
    Basic(BasicAuth),
    /// Key appended as a query parameter
    ApiKey { param: String, key: String },
}

impl Auth {
    /// Appends a query-parameter key to a URL; other modes return it as is.
    pub fn apply_to_url(&self, url: &str) -> String {
        match self {
            Auth::ApiKey { param, key } => {
                let sep = if url.contains('?') { '&' } else { '?' };
                format!("{url}{sep}{param}={key}")
            }
            _ => url.to_string(),
        }
    }

    pub fn basic(&self) -> Option<&BasicAuth> {
        match self {
            Auth::Basic(auth) => Some(auth),
            _ => None,
        }
    }
}

/// Static description of one national provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Provider {
    pub id: ProviderId,
    pub name: &'static str,
    pub attribution: &'static str,
    pub license: &'static str,
    pub bounds: GeoBounds,
    pub source: TileSource,
    pub max_zoom: u8,
    pub auth: Auth,
    /// Warnings shown when printing at a given scale
    pub scale_warnings: Vec<(u32, &'static str)>,
}
