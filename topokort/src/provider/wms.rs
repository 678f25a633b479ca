//! WMS GetMap overlays.

use std::fmt;
use std::str::FromStr;

use crate::coord::Epsg;
use crate::geometry::BBox;

const GRID_URL: &str = "https://wms.geonorge.no/skwms1/wms.rutenett";
const ROUTES_URL: &str = "https://wms.geonorge.no/skwms1/wms.friluftsruter2";
const HEIGHT_URL: &str = "https://wms.geonorge.no/skwms1/wms.hoyde-dtm";
const WEAK_ICE_URL: &str = "https://kart.nve.no/enterprise/services/SvekketIs1/MapServer/WMSServer";

/// Overlay layers that can be drawn over the basemap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OverlayKind {
    /// 1 km reference grid
    Grid,
    /// Slope shading
    Slope,
    /// Weak and cracked ice
    WeakIce,
    /// Ski trails
    Ski,
    /// Hiking trails
    Hike,
}

impl OverlayKind {
    pub const ALL: [OverlayKind; 5] = [
        OverlayKind::Grid,
        OverlayKind::Slope,
        OverlayKind::WeakIce,
        OverlayKind::Ski,
        OverlayKind::Hike,
    ];

    /// WMS endpoint and layer list.
    pub fn service(self) -> (&'static str, &'static [&'static str]) {
        match self {
            OverlayKind::Grid => (GRID_URL, &["1km_rutelinje"]),
            OverlayKind::Slope => (HEIGHT_URL, &["DTM:helning_grader"]),
            OverlayKind::WeakIce => (
                WEAK_ICE_URL,
                &[
                    "SvekketIs",
                    "SvekketIsElv",
                    "SvekketIsIkkeVurdert",
                    "OppsprukketIsLangsLand",
                ],
            ),
            OverlayKind::Ski => (ROUTES_URL, &["Skiloype"]),
            OverlayKind::Hike => (ROUTES_URL, &["Fotrute"]),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OverlayKind::Grid => "grid",
            OverlayKind::Slope => "slope",
            OverlayKind::WeakIce => "weak-ice",
            OverlayKind::Ski => "ski",
            OverlayKind::Hike => "hike",
        }
    }
}

impl fmt::Display for OverlayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OverlayKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "grid" => Ok(OverlayKind::Grid),
            "slope" | "height" => Ok(OverlayKind::Slope),
            "weak-ice" | "weakice" | "ice" => Ok(OverlayKind::WeakIce),
            "ski" => Ok(OverlayKind::Ski),
            "hike" | "hiking" => Ok(OverlayKind::Hike),
            other => Err(format!("unknown overlay '{other}'")),
        }
    }
}

/// A single WMS GetMap request.
#[derive(Debug, Clone, PartialEq)]
pub struct GetMapRequest<'a> {
    pub base_url: &'a str,
    pub layers: &'a [&'a str],
    pub width: u32,
    pub height: u32,
    pub epsg: Epsg,
    pub bbox: BBox,
    pub transparent: bool,
}

impl GetMapRequest<'_> {
    /// WMS 1.3.0 GetMap URL returning PNG.
    pub fn url(&self) -> String {
        let mut params = vec![
            ("service", "WMS".to_string()),
            ("request", "GetMap".to_string()),
            ("version", "1.3.0".to_string()),
            ("layers", self.layers.join(",")),
            ("styles", String::new()),
            ("width", self.width.to_string()),
            ("height", self.height.to_string()),
            ("format", "image/png".to_string()),
            ("crs", format!("EPSG:{}", self.epsg.code())),
            (
                "bbox",
                format!(
                    "{},{},{},{}",
                    self.bbox.minx, self.bbox.miny, self.bbox.maxx, self.bbox.maxy
                ),
            ),
        ];
        if self.transparent {
            params.push(("transparent", "true".to_string()));
        }
        let query = params
            .into_iter()
            .map(|(k, v)| format!("{k}={}", encode_query_value(&v)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{}", self.base_url, query)
    }
}

fn encode_query_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for b in value.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_map_url() {
        let (base, layers) = OverlayKind::Hike.service();
        let req = GetMapRequest {
            base_url: base,
            layers,
            width: 1116,
            height: 1579,
            epsg: Epsg::UTM33N,
            bbox: BBox::new(400000.0, 7000000.0, 410000.5, 7014000.0),
            transparent: true,
        };
        assert_eq!(
            req.url(),
            "https://wms.geonorge.no/skwms1/wms.friluftsruter2?service=WMS&request=GetMap\
             &version=1.3.0&layers=Fotrute&styles=&width=1116&height=1579&format=image%2Fpng\
             &crs=EPSG%3A25833&bbox=400000%2C7000000%2C410000.5%2C7014000&transparent=true"
        );
    }

    #[test]
    fn test_opaque_request_omits_transparent() {
        let (base, layers) = OverlayKind::WeakIce.service();
        let req = GetMapRequest {
            base_url: base,
            layers,
            width: 10,
            height: 10,
            epsg: Epsg::UTM32N,
            bbox: BBox::new(0.0, 0.0, 1.0, 1.0),
            transparent: false,
        };
        let url = req.url();
        assert!(!url.contains("transparent"));
        assert!(url.contains(
            "layers=SvekketIs%2CSvekketIsElv%2CSvekketIsIkkeVurdert%2COppsprukketIsLangsLand"
        ));
    }

    #[test]
    fn test_overlay_parsing() {
        for kind in OverlayKind::ALL {
            assert_eq!(kind.as_str().parse::<OverlayKind>().unwrap(), kind);
        }
        assert_eq!("height".parse::<OverlayKind>().unwrap(), OverlayKind::Slope);
    }
}
