//! Magnetic declination source.

use chrono::NaiveDate;

use crate::coord::LonLat;

/// Magnetic declination relative to true north, in degrees east.
pub trait DeclinationModel: Send + Sync {
    /// Declination at a position on a date, `None` when the model has no
    /// value for it.
    fn declination(&self, at: LonLat, date: NaiveDate) -> Option<f64>;
}

/// The same declination everywhere, e.g. read off a current paper map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedDeclination(pub f64);

impl DeclinationModel for FixedDeclination {
    fn declination(&self, _at: LonLat, _date: NaiveDate) -> Option<f64> {
        self.0.is_finite().then_some(self.0)
    }
}

/// No declination data; labels read "unknown".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnknownDeclination;

impl DeclinationModel for UnknownDeclination {
    fn declination(&self, _at: LonLat, _date: NaiveDate) -> Option<f64> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_models() {
        let date = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
        let at = LonLat::new(10.0, 60.0);
        assert_eq!(FixedDeclination(3.5).declination(at, date), Some(3.5));
        assert_eq!(FixedDeclination(f64::NAN).declination(at, date), None);
        assert_eq!(UnknownDeclination.declination(at, date), None);
    }
}
