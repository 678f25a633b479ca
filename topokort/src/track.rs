//! GPX track input.
//!
//! A [`Track`] is an ordered list of WGS84 points plus the indices where a
//! new sub-track starts. Drawing never joins a point to the one before a
//! break.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::coord::{LonLat, Point, Projection, ProjectionError};

/// Largest GPX file accepted.
pub const MAX_GPX_BYTES: u64 = 50 * 1024 * 1024;

/// Failure reading a GPX track.
#[derive(Debug, Error)]
pub enum GpxError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is {size} bytes, larger than the {max} byte limit")]
    TooLarge { path: PathBuf, size: u64, max: u64 },

    #[error("Invalid GPX document: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("Invalid coordinate {attribute}=\"{value}\" in GPX point {index}")]
    InvalidCoordinate {
        index: usize,
        attribute: &'static str,
        value: String,
    },

    #[error("No track points found in the GPX file")]
    NoPoints,
}

fn coordinate(node: roxmltree::Node<'_, '_>, index: usize, attribute: &'static str) -> Result<f64, GpxError> {
    let raw = node.attribute(attribute).unwrap_or("");
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| GpxError::InvalidCoordinate {
            index,
            attribute,
            value: raw.to_string(),
        })
}

fn points_named(doc: &roxmltree::Document<'_>, name: &str) -> Result<Vec<LonLat>, GpxError> {
    doc.descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == name)
        .enumerate()
        .map(|(i, n)| Ok(LonLat::new(coordinate(n, i, "lon")?, coordinate(n, i, "lat")?)))
        .collect()
}

/// Extracts all `trkpt` positions of a GPX document, or its `rtept`
/// positions when it has no track points.
pub fn parse_gpx(xml: &str) -> Result<Vec<LonLat>, GpxError> {
    let doc = roxmltree::Document::parse(xml)?;
    let mut points = points_named(&doc, "trkpt")?;
    if points.is_empty() {
        points = points_named(&doc, "rtept")?;
    }
    if points.is_empty() {
        return Err(GpxError::NoPoints);
    }
    Ok(points)
}

/// Reads and parses a GPX file, rejecting files over [`MAX_GPX_BYTES`].
pub fn read_gpx(path: &Path) -> Result<Vec<LonLat>, GpxError> {
    let io_err = |source| GpxError::Io {
        path: path.to_path_buf(),
        source,
    };
    let size = fs::metadata(path).map_err(io_err)?.len();
    if size > MAX_GPX_BYTES {
        return Err(GpxError::TooLarge {
            path: path.to_path_buf(),
            size,
            max: MAX_GPX_BYTES,
        });
    }
    let xml = fs::read_to_string(path).map_err(io_err)?;
    let points = parse_gpx(&xml)?;
    debug!(path = %path.display(), points = points.len(), "Read GPX track");
    Ok(points)
}

/// Track points with sub-track breaks.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    points: Vec<LonLat>,
    /// Start index of every sub-track, always beginning with 0
    breaks: Vec<usize>,
}

impl Track {
    /// A single continuous track.
    pub fn new(points: Vec<LonLat>) -> Self {
        Self { points, breaks: vec![0] }
    }

    /// Concatenates sub-tracks, recording where each one starts. Empty
    /// segments are skipped.
    pub fn from_segments(segments: impl IntoIterator<Item = Vec<LonLat>>) -> Self {
        let mut points = Vec::new();
        let mut breaks = Vec::new();
        for segment in segments {
            if segment.is_empty() {
                continue;
            }
            breaks.push(points.len());
            points.extend(segment);
        }
        if breaks.is_empty() {
            breaks.push(0);
        }
        Self { points, breaks }
    }

    /// Reads one sub-track per GPX file, in order.
    pub fn from_files<P: AsRef<Path>>(paths: &[P]) -> Result<Self, GpxError> {
        let segments = paths
            .iter()
            .map(|p| read_gpx(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_segments(segments))
    }

    pub fn points(&self) -> &[LonLat] {
        &self.points
    }

    pub fn breaks(&self) -> &[usize] {
        &self.breaks
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn segment_count(&self) -> usize {
        if self.points.is_empty() {
            0
        } else {
            self.breaks.len()
        }
    }
}

/// A track projected into its local UTM zone.
#[derive(Debug)]
pub struct ProjectedTrack {
    pub projection: Projection,
    pub points: Vec<Point>,
    pub breaks: Vec<usize>,
}

impl ProjectedTrack {
    /// Projects `track` into the zone inferred from its points.
    pub fn new(track: &Track) -> Result<Self, ProjectionError> {
        let projection = Projection::for_points(track.points())?;
        let points = projection.forward_all(track.points())?;
        Ok(Self {
            projection,
            points,
            breaks: track.breaks().to_vec(),
        })
    }

    /// Track points in another zone's planar coordinates.
    pub fn points_in(&self, target: &Projection) -> Result<Vec<Point>, ProjectionError> {
        if target.epsg() == self.projection.epsg() {
            return Ok(self.points.clone());
        }
        self.points
            .iter()
            .map(|p| self.projection.point_to(*p, target))
            .collect()
    }
}
