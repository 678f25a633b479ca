//! Provider table for the Nordic national mapping agencies.

use std::collections::BTreeSet;

use tracing::debug;

use super::http::BasicAuth;
use super::types::{
    Auth, GeoBounds, MatrixSet, NativeMatrixSource, Provider, ProviderId, TileSource,
    WebMercatorSource,
};
use crate::coord::Epsg;

/// Max zoom assumed for an unknown provider.
pub const DEFAULT_MAX_ZOOM: u8 = 18;

const KARTVERKET_BASE: &str = "https://cache.kartverket.no/v1/wmts/1.0.0";
const LANTMATERIET_TEMPLATE: &str =
    "https://maps.lantmateriet.se/open/topowebb-ccby/v1/wmts/1.0.0/{layer}/default/3857/{z}/{y}/{x}.png";
const MML_TEMPLATE: &str = "https://avoin-karttakuva.maanmittauslaitos.fi/avoin/wmts/1.0.0/{layer}/default/WGS84_Pseudo-Mercator/{z}/{y}/{x}.png";

/// Provider credentials, usually read from the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Lantmäteriet user (`LM_USER`)
    pub lm_user: Option<String>,
    /// Lantmäteriet password (`LM_PASS`)
    pub lm_pass: Option<String>,
    /// Maanmittauslaitos API key (`MML_API_KEY`)
    pub mml_api_key: Option<String>,
}

impl Credentials {
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Self {
            lm_user: var("LM_USER"),
            lm_pass: var("LM_PASS"),
            mml_api_key: var("MML_API_KEY"),
        }
    }
}

/// Ordered set of providers owned by a render session.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    providers: Vec<Provider>,
}

impl ProviderRegistry {
    pub fn new(providers: Vec<Provider>) -> Self {
        Self { providers }
    }

    /// Norway, Sweden and Finland, in that order.
    pub fn nordic(credentials: &Credentials) -> Self {
        let se_auth = match (&credentials.lm_user, &credentials.lm_pass) {
            (Some(user), Some(password)) => Auth::Basic(BasicAuth {
                user: user.clone(),
                password: password.clone(),
            }),
            _ => Auth::None,
        };
        let fi_auth = match &credentials.mml_api_key {
            Some(key) => Auth::ApiKey {
                param: "api-key".to_string(),
                key: key.clone(),
            },
            None => Auth::None,
        };
        debug!(
            se_auth = !matches!(se_auth, Auth::None),
            fi_auth = !matches!(fi_auth, Auth::None),
            "Building Nordic provider registry"
        );

        Self::new(vec![
            Provider {
                id: ProviderId::No,
                name: "Kartverket",
                attribution: "© Kartverket",
                license: "CC BY 4.0",
                bounds: GeoBounds {
                    min_lat: 57.5,
                    max_lat: 71.5,
                    min_lon: 4.0,
                    max_lon: 31.5,
                },
                source: TileSource::NativeMatrix(NativeMatrixSource {
                    base_url: KARTVERKET_BASE.to_string(),
                    capabilities_url: format!("{KARTVERKET_BASE}/WMTSCapabilities.xml"),
                    layer: "toporaster".to_string(),
                    matrix_sets: vec![
                        MatrixSet {
                            epsg: Epsg::UTM32N,
                            id: "utm32n".to_string(),
                        },
                        MatrixSet {
                            epsg: Epsg::UTM33N,
                            id: "utm33n".to_string(),
                        },
                        MatrixSet {
                            epsg: Epsg::UTM35N,
                            id: "utm35n".to_string(),
                        },
                    ],
                    xyz_template: format!(
                        "{KARTVERKET_BASE}/toporaster/default/webmercator/{{z}}/{{y}}/{{x}}.png"
                    ),
                }),
                max_zoom: 18,
                auth: Auth::None,
                scale_warnings: Vec::new(),
            },
            Provider {
                id: ProviderId::Se,
                name: "Lantmäteriet",
                attribution: "© Lantmäteriet",
                license: "CC BY 4.0",
                bounds: GeoBounds {
                    min_lat: 55.0,
                    max_lat: 69.5,
                    min_lon: 10.5,
                    max_lon: 24.5,
                },
                source: TileSource::WebMercator(WebMercatorSource {
                    url_template: LANTMATERIET_TEMPLATE.to_string(),
                    layer: "topowebb".to_string(),
                }),
                max_zoom: 15,
                auth: se_auth,
                scale_warnings: vec![(
                    25_000,
                    "Swedish maps may show reduced detail at 1:25,000 scale due to source resolution limits.",
                )],
            },
            Provider {
                id: ProviderId::Fi,
                name: "Maanmittauslaitos",
                attribution: "© Maanmittauslaitos",
                license: "CC BY 4.0",
                bounds: GeoBounds {
                    min_lat: 59.5,
                    max_lat: 70.5,
                    min_lon: 19.0,
                    max_lon: 32.0,
                },
                source: TileSource::WebMercator(WebMercatorSource {
                    url_template: MML_TEMPLATE.to_string(),
                    layer: "maastokartta".to_string(),
                }),
                max_zoom: 16,
                auth: fi_auth,
                scale_warnings: Vec::new(),
            },
        ])
    }

    pub fn get(&self, id: ProviderId) -> Option<&Provider> {
        self.providers.iter().find(|p| p.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Provider> {
        self.providers.iter()
    }

    /// Max zoom of a provider, [`DEFAULT_MAX_ZOOM`] when unknown.
    pub fn max_zoom(&self, id: ProviderId) -> u8 {
        self.get(id).map_or(DEFAULT_MAX_ZOOM, |p| p.max_zoom)
    }

    /// Lowest max zoom among the given providers.
    pub fn min_max_zoom(&self, ids: &[ProviderId]) -> u8 {
        ids.iter()
            .map(|id| self.max_zoom(*id))
            .min()
            .unwrap_or(DEFAULT_MAX_ZOOM)
    }

    /// Distinct attributions joined with `" | "`, in the given order.
    pub fn combined_attribution(&self, ids: &[ProviderId]) -> String {
        let mut seen = BTreeSet::new();
        ids.iter()
            .filter_map(|id| self.get(*id))
            .map(|p| p.attribution)
            .filter(|a| seen.insert(*a))
            .collect::<Vec<_>>()
            .join(" | ")
    }

    /// Warnings that apply when printing these providers at `scale`.
    pub fn scale_warnings(&self, ids: &[ProviderId], scale: u32) -> Vec<&'static str> {
        ids.iter()
            .filter_map(|id| self.get(*id))
            .flat_map(|p| p.scale_warnings.iter())
            .filter(|(s, _)| *s == scale)
            .map(|(_, msg)| *msg)
            .collect()
    }
}
