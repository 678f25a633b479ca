//! Border resolution
//!
//! Decides which national providers cover a geographic box by testing it
//! against country boundary polygons. Geometry is loaded by the caller and
//! handed to [`BorderResolver`]; without any borders every lookup falls back
//! to the configured fallback provider.

mod geometry;

pub use geometry::{point_in_polygon, BorderError, CountryBorder, Polygon, Ring};

use tracing::trace;

use crate::coord::LonLat;
use crate::geometry::BBox;
use crate::provider::ProviderId;

/// Provider used when no border matches.
pub const FALLBACK_PROVIDER: ProviderId = ProviderId::No;

/// Provider lookup against loaded country borders.
#[derive(Debug, Clone)]
pub struct BorderResolver {
    borders: Vec<(ProviderId, CountryBorder)>,
    fallback: ProviderId,
}

impl Default for BorderResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl BorderResolver {
    /// Resolver with no borders; every lookup yields the fallback.
    pub fn new() -> Self {
        Self {
            borders: Vec::new(),
            fallback: FALLBACK_PROVIDER,
        }
    }

    /// Adds or replaces the border of a provider.
    pub fn with_border(mut self, id: ProviderId, border: CountryBorder) -> Self {
        self.borders.retain(|(existing, _)| *existing != id);
        self.borders.push((id, border));
        self.borders.sort_by_key(|(id, _)| *id);
        self
    }

    pub fn with_fallback(mut self, fallback: ProviderId) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn fallback(&self) -> ProviderId {
        self.fallback
    }

    pub fn has_borders(&self) -> bool {
        !self.borders.is_empty()
    }

    /// Providers whose border intersects a WGS84 bbox, in registry order.
    /// May be empty.
    pub fn tile_providers(&self, bbox: &BBox) -> Vec<ProviderId> {
        self.borders
            .iter()
            .filter(|(_, border)| border.intersects_bbox(bbox))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Like [`tile_providers`](Self::tile_providers), substituting the
    /// fallback for an empty result.
    pub fn resolve(&self, bbox: &BBox) -> Vec<ProviderId> {
        let providers = self.tile_providers(bbox);
        if providers.is_empty() {
            trace!(fallback = %self.fallback, "No border intersects bbox, using fallback");
            vec![self.fallback]
        } else {
            providers
        }
    }

    /// Providers whose border contains a point.
    pub fn point_providers(&self, p: LonLat) -> Vec<ProviderId> {
        self.borders
            .iter()
            .filter(|(_, border)| border.contains(p))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Preferred provider for a point: the first containing border, then
    /// coarse coverage boxes for Sweden and Finland, else Norway.
    pub fn primary_provider(&self, p: LonLat) -> ProviderId {
        if let Some(id) = self.point_providers(p).first() {
            return *id;
        }
        if p.lat >= 55.0 && (10.5..=24.5).contains(&p.lon) {
            ProviderId::Se
        } else if p.lat >= 59.5 && p.lon >= 19.0 {
            ProviderId::Fi
        } else {
            ProviderId::No
        }
    }

    /// Border used to clip a provider's imagery.
    pub fn polygon(&self, id: ProviderId) -> Option<&CountryBorder> {
        self.borders
            .iter()
            .find(|(existing, _)| *existing == id)
            .map(|(_, border)| border)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Norway west of lon 12, Sweden east of it; both from lat 55 to 70.
    fn resolver() -> BorderResolver {
        BorderResolver::new()
            .with_border(
                ProviderId::Se,
                CountryBorder::from_ring(&[(12.0, 55.0), (20.0, 55.0), (20.0, 70.0), (12.0, 70.0), (12.0, 55.0)]),
            )
            .with_border(
                ProviderId::No,
                CountryBorder::from_ring(&[(4.0, 55.0), (12.0, 55.0), (12.0, 70.0), (4.0, 70.0), (4.0, 55.0)]),
            )
    }

    #[test]
    fn test_single_country() {
        let r = resolver();
        assert_eq!(r.tile_providers(&BBox::new(8.0, 60.0, 9.0, 61.0)), vec![ProviderId::No]);
        assert_eq!(r.tile_providers(&BBox::new(15.0, 60.0, 16.0, 61.0)), vec![ProviderId::Se]);
    }

    #[test]
    fn test_border_bbox_in_registry_order() {
        let r = resolver();
        assert_eq!(
            r.tile_providers(&BBox::new(11.5, 60.0, 12.5, 61.0)),
            vec![ProviderId::No, ProviderId::Se]
        );
    }

    #[test]
    fn test_empty_falls_back() {
        let r = resolver();
        let far = BBox::new(-40.0, 0.0, -39.0, 1.0);
        assert!(r.tile_providers(&far).is_empty());
        assert_eq!(r.resolve(&far), vec![ProviderId::No]);
        assert_eq!(BorderResolver::new().with_fallback(ProviderId::Fi).resolve(&far), vec![ProviderId::Fi]);
    }

    #[test]
    fn test_primary_provider() {
        let r = resolver();
        assert_eq!(r.primary_provider(LonLat::new(15.0, 60.0)), ProviderId::Se);
        assert_eq!(r.primary_provider(LonLat::new(8.0, 60.0)), ProviderId::No);

        let empty = BorderResolver::new();
        assert_eq!(empty.primary_provider(LonLat::new(15.0, 60.0)), ProviderId::Se);
        assert_eq!(empty.primary_provider(LonLat::new(27.0, 62.0)), ProviderId::Fi);
        assert_eq!(empty.primary_provider(LonLat::new(8.0, 60.0)), ProviderId::No);
    }

    #[test]
    fn test_polygon_lookup() {
        let r = resolver();
        assert!(r.polygon(ProviderId::No).is_some());
        assert!(r.polygon(ProviderId::Fi).is_none());
        assert!(r.has_borders());
        assert!(!BorderResolver::default().has_borders());
    }
}
