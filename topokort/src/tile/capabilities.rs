//! WMTS capabilities: tile-matrix sets and matrix selection.

use std::sync::Arc;

use moka::future::Cache;
use thiserror::Error;
use tracing::{debug, info};

use super::retry::{with_retry, RetryPolicy};
use crate::geometry::BBox;
use crate::provider::{HttpClient, HttpError};

/// OGC standardized rendering pixel size in metres.
pub const OGC_PIXEL_SIZE_M: f64 = 0.00028;

/// Tile size assumed when a matrix omits `TileWidth`/`TileHeight`.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Tile-matrix metadata unavailable or unusable. Always fatal.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CapabilitiesError {
    #[error("WMTS capabilities could not be fetched: {0}")]
    Fetch(#[from] HttpError),

    #[error("WMTS capabilities could not be parsed: {0}")]
    Parse(String),

    #[error("TileMatrixSet '{0}' not found in capabilities")]
    MatrixSetNotFound(String),

    #[error("No TileMatrix entries in set '{0}'")]
    NoMatrices(String),
}

/// One resolution level of a tile-matrix set.
#[derive(Debug, Clone, PartialEq)]
pub struct TileMatrix {
    pub id: String,
    pub scale_denominator: f64,
    /// Top-left corner `(x, y)` in the set's CRS
    pub top_left: (f64, f64),
    pub tile_width: u32,
    pub tile_height: u32,
    pub matrix_width: Option<u64>,
    pub matrix_height: Option<u64>,
}

impl TileMatrix {
    /// Ground resolution in metres per pixel.
    pub fn resolution(&self) -> f64 {
        self.scale_denominator * OGC_PIXEL_SIZE_M
    }

    /// Tiles of this matrix covering `bbox`.
    pub fn tile_range(&self, bbox: &BBox) -> TileRange {
        let res = self.resolution();
        let span_x = self.tile_width as f64 * res;
        let span_y = self.tile_height as f64 * res;
        let (ox, oy) = self.top_left;
        TileRange {
            min_col: ((bbox.minx - ox) / span_x).floor() as i64,
            max_col: ((bbox.maxx - ox) / span_x).floor() as i64,
            // Rows grow downward from the origin.
            min_row: ((oy - bbox.maxy) / span_y).floor() as i64,
            max_row: ((oy - bbox.miny) / span_y).floor() as i64,
            span_x,
            span_y,
        }
    }
}

/// Inclusive row/column range of a matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileRange {
    pub min_col: i64,
    pub max_col: i64,
    pub min_row: i64,
    pub max_row: i64,
    /// Ground width of one tile
    pub span_x: f64,
    /// Ground height of one tile
    pub span_y: f64,
}

impl TileRange {
    pub fn cols(&self) -> u64 {
        (self.max_col - self.min_col + 1).max(0) as u64
    }

    pub fn rows(&self) -> u64 {
        (self.max_row - self.min_row + 1).max(0) as u64
    }

    pub fn count(&self) -> u64 {
        self.cols() * self.rows()
    }
}

/// A tile-matrix set, matrices sorted by ascending scale denominator
/// (most detailed first).
#[derive(Debug, Clone, PartialEq)]
pub struct TileMatrixSet {
    pub id: String,
    pub matrices: Vec<TileMatrix>,
}

impl TileMatrixSet {
    /// Parses one set out of a capabilities document.
    pub fn parse(xml: &str, set_id: &str) -> Result<Self, CapabilitiesError> {
        let doc = roxmltree::Document::parse(xml).map_err(|e| CapabilitiesError::Parse(e.to_string()))?;

        // Layers also contain `TileMatrixSet` link elements; only definitions
        // carry an `Identifier` child.
        let set = doc
            .descendants()
            .filter(|n| is_element_named(n, "TileMatrixSet"))
            .find(|n| child_text(*n, "Identifier") == Some(set_id))
            .ok_or_else(|| CapabilitiesError::MatrixSetNotFound(set_id.to_string()))?;

        let mut matrices: Vec<TileMatrix> = set
            .children()
            .filter(|n| is_element_named(n, "TileMatrix"))
            .filter_map(parse_matrix)
            .collect();

        if matrices.is_empty() {
            return Err(CapabilitiesError::NoMatrices(set_id.to_string()));
        }

        matrices.sort_by(|a, b| a.scale_denominator.total_cmp(&b.scale_denominator));
        Ok(Self {
            id: set_id.to_string(),
            matrices,
        })
    }

    /// Index of the matrix whose resolution is closest to `desired` on a
    /// log scale. Ties keep the more detailed matrix.
    pub fn best_matrix_index(&self, desired: f64) -> usize {
        let mut best = 0;
        let mut best_diff = f64::INFINITY;
        for (i, m) in self.matrices.iter().enumerate() {
            let diff = (m.resolution() / desired).ln().abs();
            if diff < best_diff {
                best_diff = diff;
                best = i;
            }
        }
        best
    }

    /// Best matrix for `desired`, stepped coarser while the tile count for
    /// `bbox` exceeds `budget`. The coarsest matrix is returned even when
    /// it is still over budget.
    pub fn choose_matrix(&self, desired: f64, bbox: &BBox, budget: usize) -> (&TileMatrix, TileRange) {
        let mut index = self.best_matrix_index(desired);
        loop {
            let matrix = &self.matrices[index];
            let range = matrix.tile_range(bbox);
            if range.count() <= budget as u64 || index + 1 >= self.matrices.len() {
                return (matrix, range);
            }
            debug!(matrix = %matrix.id, tiles = range.count(), budget, "Stepping to coarser matrix");
            index += 1;
        }
    }
}

/// Matches on the local name so `ows:` prefixes don't matter.
fn is_element_named(node: &roxmltree::Node<'_, '_>, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name
}

fn child_text<'a>(node: roxmltree::Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.children()
        .find(|n| is_element_named(n, name))
        .and_then(|n| n.text())
        .map(str::trim)
}

fn child_number<T: std::str::FromStr>(node: roxmltree::Node<'_, '_>, name: &str) -> Option<T> {
    child_text(node, name).and_then(|t| t.parse().ok())
}

fn parse_corner(text: &str) -> Option<(f64, f64)> {
    let mut parts = text.split_whitespace().map(|p| p.parse::<f64>());
    match (parts.next(), parts.next()) {
        (Some(Ok(x)), Some(Ok(y))) if x.is_finite() && y.is_finite() => Some((x, y)),
        _ => None,
    }
}

fn parse_matrix(node: roxmltree::Node<'_, '_>) -> Option<TileMatrix> {
    let id = child_text(node, "Identifier").filter(|s| !s.is_empty())?;
    let scale_denominator = child_number::<f64>(node, "ScaleDenominator").filter(|s| s.is_finite())?;
    let top_left = child_text(node, "TopLeftCorner").and_then(parse_corner)?;
    Some(TileMatrix {
        id: id.to_string(),
        scale_denominator,
        top_left,
        tile_width: child_number(node, "TileWidth").unwrap_or(DEFAULT_TILE_SIZE),
        tile_height: child_number(node, "TileHeight").unwrap_or(DEFAULT_TILE_SIZE),
        matrix_width: child_number(node, "MatrixWidth"),
        matrix_height: child_number(node, "MatrixHeight"),
    })
}

/// Session cache of parsed tile-matrix sets, keyed by capabilities URL and
/// set id. Concurrent lookups of the same set share one fetch.
#[derive(Clone)]
pub struct CapabilitiesStore {
    sets: Cache<String, Arc<TileMatrixSet>>,
}

impl Default for CapabilitiesStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilitiesStore {
    pub fn new() -> Self {
        Self {
            sets: Cache::builder().max_capacity(32).build(),
        }
    }

    /// Returns the named set, fetching and parsing the capabilities document
    /// on first use.
    pub async fn matrix_set<C: HttpClient>(
        &self,
        client: &C,
        capabilities_url: &str,
        set_id: &str,
        retry: &RetryPolicy,
    ) -> Result<Arc<TileMatrixSet>, CapabilitiesError> {
        let key = format!("{capabilities_url}#{set_id}");
        self.sets
            .try_get_with(key, async {
                let body = with_retry(retry, "capabilities", |_| client.get(capabilities_url, None)).await?;
                let xml = std::str::from_utf8(&body).map_err(|e| CapabilitiesError::Parse(e.to_string()))?;
                let set = TileMatrixSet::parse(xml, set_id)?;
                info!(set = set_id, matrices = set.matrices.len(), "Loaded WMTS tile matrix set");
                Ok::<_, CapabilitiesError>(Arc::new(set))
            })
            .await
            .map_err(|e| (*e).clone())
    }

    pub fn clear(&self) {
        self.sets.invalidate_all();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use bytes::Bytes;

    use crate::config::FetchPolicy;
    use crate::provider::{status_error, MockHttpClient};

    /// Capabilities document with one UTM33 set of three matrices
    /// (unordered on purpose) and a layer link element.
    pub(crate) const CAPABILITIES: &str = r#"<?xml version="1.0"?>
<Capabilities xmlns="http://www.opengis.net/wmts/1.0" xmlns:ows="http://www.opengis.net/ows/1.1">
  <Contents>
    <Layer>
      <ows:Identifier>toporaster</ows:Identifier>
      <TileMatrixSetLink><TileMatrixSet>utm33n</TileMatrixSet></TileMatrixSetLink>
    </Layer>
    <TileMatrixSet>
      <ows:Identifier>utm33n</ows:Identifier>
      <TileMatrix>
        <ows:Identifier>1</ows:Identifier>
        <ScaleDenominator>35714.28571428572</ScaleDenominator>
        <TopLeftCorner>-2500000.0 9045984.0</TopLeftCorner>
        <TileWidth>256</TileWidth><TileHeight>256</TileHeight>
        <MatrixWidth>100</MatrixWidth><MatrixHeight>100</MatrixHeight>
      </TileMatrix>
      <TileMatrix>
        <ows:Identifier>0</ows:Identifier>
        <ScaleDenominator>71428.57142857143</ScaleDenominator>
        <TopLeftCorner>-2500000.0 9045984.0</TopLeftCorner>
        <TileWidth>256</TileWidth><TileHeight>256</TileHeight>
      </TileMatrix>
      <TileMatrix>
        <ows:Identifier>2</ows:Identifier>
        <ScaleDenominator>17857.14285714286</ScaleDenominator>
        <TopLeftCorner>-2500000.0 9045984.0</TopLeftCorner>
      </TileMatrix>
      <TileMatrix>
        <ows:Identifier>broken</ows:Identifier>
        <ScaleDenominator>n/a</ScaleDenominator>
        <TopLeftCorner>0 0</TopLeftCorner>
      </TileMatrix>
    </TileMatrixSet>
    <TileMatrixSet>
      <ows:Identifier>empty</ows:Identifier>
    </TileMatrixSet>
  </Contents>
</Capabilities>"#;

    #[test]
    fn test_parse_sorts_by_scale_and_skips_broken() {
        let set = TileMatrixSet::parse(CAPABILITIES, "utm33n").unwrap();
        let ids: Vec<_> = set.matrices.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["2", "1", "0"]);
        assert_eq!(set.matrices[0].tile_width, DEFAULT_TILE_SIZE);
        assert_eq!(set.matrices[1].matrix_width, Some(100));
        assert!((set.matrices[2].resolution() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            TileMatrixSet::parse(CAPABILITIES, "utm35n"),
            Err(CapabilitiesError::MatrixSetNotFound("utm35n".into()))
        );
        assert_eq!(
            TileMatrixSet::parse(CAPABILITIES, "empty"),
            Err(CapabilitiesError::NoMatrices("empty".into()))
        );
        assert!(matches!(
            TileMatrixSet::parse("<not xml", "utm33n"),
            Err(CapabilitiesError::Parse(_))
        ));
    }

    #[test]
    fn test_best_matrix_by_log_distance() {
        let set = TileMatrixSet::parse(CAPABILITIES, "utm33n").unwrap();
        // Resolutions are 5, 10 and 20 m/px.
        assert_eq!(set.best_matrix_index(4.2), 0);
        assert_eq!(set.best_matrix_index(8.0), 1);
        assert_eq!(set.best_matrix_index(100.0), 2);
    }

    #[test]
    fn test_tile_range_and_coarsening() {
        let set = TileMatrixSet::parse(CAPABILITIES, "utm33n").unwrap();
        let m = &set.matrices[1];
        // Tile span 2560 m.
        let bbox = BBox::new(-2_500_000.0, 9_045_984.0 - 5000.0, -2_500_000.0 + 5000.0, 9_045_984.0);
        let range = m.tile_range(&bbox);
        assert_eq!((range.min_col, range.max_col, range.min_row, range.max_row), (0, 1, 0, 1));
        assert_eq!(range.count(), 4);

        let (chosen, range) = set.choose_matrix(5.0, &bbox, 4);
        assert_eq!(chosen.id, "1");
        assert_eq!(range.count(), 4);

        let (chosen, _) = set.choose_matrix(5.0, &bbox, 0);
        assert_eq!(chosen.id, "0", "coarsest matrix is the floor");
    }

    #[tokio::test]
    async fn test_store_fetches_once_and_retries() {
        let attempts = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = attempts.clone();
        let client = MockHttpClient::new(move |url| {
            if counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0 {
                Err(status_error(url, 503))
            } else {
                Ok(Bytes::from_static(CAPABILITIES.as_bytes()))
            }
        });
        let store = CapabilitiesStore::new();
        let retry = RetryPolicy::for_capabilities(&FetchPolicy::default().without_delays());

        let a = store.matrix_set(&client, "https://c/caps.xml", "utm33n", &retry).await.unwrap();
        let b = store.matrix_set(&client, "https://c/caps.xml", "utm33n", &retry).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(client.call_count(), 2);
    }

    #[tokio::test]
    async fn test_store_surfaces_missing_set() {
        let client = MockHttpClient::always(Bytes::from_static(CAPABILITIES.as_bytes()));
        let store = CapabilitiesStore::new();
        let err = store
            .matrix_set(&client, "https://c/caps.xml", "nope", &RetryPolicy::None)
            .await
            .unwrap_err();
        assert_eq!(err, CapabilitiesError::MatrixSetNotFound("nope".into()));
    }
}
