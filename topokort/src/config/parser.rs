//! INI parsing and serialization for [`ConfigFile`].
//!
//! This is the single place where INI key names are mapped to struct fields.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use ini::{Ini, Properties};

use super::file::{ConfigFile, ConfigFileError};
use crate::layout::{validate_scale, LayoutMode, OrientationChoice, Paper};
use crate::provider::OverlayKind;

fn invalid(section: &str, key: &str, value: &str, reason: impl Into<String>) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// Parses `key` from a section when present.
fn parse_value<T: FromStr>(
    props: &Properties,
    section: &str,
    key: &str,
    reason: &str,
) -> Result<Option<T>, ConfigFileError> {
    match props.get(key) {
        Some(v) => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| invalid(section, key, v, reason)),
        None => Ok(None),
    }
}

fn parse_bool(props: &Properties, section: &str, key: &str) -> Result<Option<bool>, ConfigFileError> {
    match props.get(key) {
        Some(v) => match v.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(Some(true)),
            "false" | "no" | "off" | "0" => Ok(Some(false)),
            _ => Err(invalid(section, key, v, "must be true or false")),
        },
        None => Ok(None),
    }
}

fn parse_fraction(
    props: &Properties,
    section: &str,
    key: &str,
    max: f64,
) -> Result<Option<f64>, ConfigFileError> {
    let reason = format!("must be a number between 0 and {max}");
    match parse_value::<f64>(props, section, key, &reason)? {
        Some(v) if (0.0..=max).contains(&v) => Ok(Some(v)),
        Some(v) => Err(invalid(section, key, &v.to_string(), reason)),
        None => Ok(None),
    }
}

fn parse_millis(props: &Properties, section: &str, key: &str) -> Result<Option<Duration>, ConfigFileError> {
    Ok(parse_value::<u64>(props, section, key, "must be a whole number of milliseconds")?
        .map(Duration::from_millis))
}

fn parse_count(props: &Properties, section: &str, key: &str) -> Result<Option<usize>, ConfigFileError> {
    match parse_value::<usize>(props, section, key, "must be a positive integer")? {
        Some(0) => Err(invalid(section, key, "0", "must be a positive integer")),
        other => Ok(other),
    }
}

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();
    let render = &mut config.render;

    // [render] section
    if let Some(s) = ini.section(Some("render")) {
        if let Some(v) = s.get("scale") {
            let scale: u32 = v
                .trim()
                .parse()
                .map_err(|_| invalid("render", "scale", v, "must be 25000, 50000 or 100000"))?;
            render.layout.scale = validate_scale(scale)
                .map_err(|_| invalid("render", "scale", v, "must be 25000, 50000 or 100000"))?;
        }
        if let Some(v) = s.get("paper") {
            render.layout.paper = v
                .parse::<Paper>()
                .map_err(|_| invalid("render", "paper", v, "must be one of: A5, A4, A3"))?;
        }
        if let Some(v) = s.get("dpi") {
            render.layout.dpi = match v.trim().parse::<u32>() {
                Ok(dpi) if (72..=1200).contains(&dpi) => dpi,
                _ => return Err(invalid("render", "dpi", v, "must be between 72 and 1200")),
            };
        }
        if let Some(o) = parse_value::<OrientationChoice>(s, "render", "orientation", "must be auto, portrait or landscape")? {
            render.layout.orientation = o;
        }
        if let Some(v) = s.get("layout") {
            let v = v.trim();
            render.layout.mode = if v.is_empty() {
                None
            } else {
                Some(
                    v.parse::<LayoutMode>()
                        .map_err(|_| invalid("render", "layout", v, "must be adaptive, greedy or grid"))?,
                )
            };
        }
        if let Some(v) = parse_fraction(s, "render", "overlap", 0.9)? {
            render.layout.overlap = v;
        }
        if let Some(v) = parse_fraction(s, "render", "margin", 0.45)? {
            render.layout.margin = v;
        }
        if let Some(v) = parse_bool(s, "render", "greyscale")? {
            render.greyscale = v;
        }
        if let Some(v) = parse_bool(s, "render", "declination")? {
            render.declination = v;
        }
    }

    // [track] section
    if let Some(s) = ini.section(Some("track")) {
        if let Some(v) = parse_value(s, "track", "color", "must be a hex colour like #ff0000")? {
            render.track.color = v;
        }
        if let Some(v) = parse_value::<f32>(s, "track", "width", "must be a positive number")? {
            if !(v > 0.0) {
                return Err(invalid("track", "width", &v.to_string(), "must be a positive number"));
            }
            render.track.width = v;
        }
        if let Some(v) = parse_fraction(s, "track", "opacity", 1.0)? {
            render.track.opacity = v as f32;
        }
    }

    // [overlays] section
    if let Some(s) = ini.section(Some("overlays")) {
        if let Some(v) = s.get("layers") {
            render.overlays.layers = v
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(|name| {
                    name.parse::<OverlayKind>().map_err(|_| {
                        invalid("overlays", "layers", v, "must list grid, slope, weak-ice, ski or hike")
                    })
                })
                .collect::<Result<_, _>>()?;
        }
        if let Some(v) = parse_fraction(s, "overlays", "height_opacity", 1.0)? {
            render.overlays.height_opacity = v as f32;
        }
        if let Some(v) = parse_fraction(s, "overlays", "weak_ice_opacity", 1.0)? {
            render.overlays.weak_ice_opacity = v as f32;
        }
        if let Some(v) = parse_fraction(s, "overlays", "height_scale_factor", 1.0)? {
            render.overlays.height_scale_factor = Some(v);
        }
    }

    // [output] section
    if let Some(s) = ini.section(Some("output")) {
        if let Some(v) = parse_value(s, "output", "format", "must be png or jpeg")? {
            render.format = v;
        }
        if let Some(v) = parse_fraction(s, "output", "quality", 1.0)? {
            render.quality = v;
        }
    }

    // [fetch] section
    if let Some(s) = ini.section(Some("fetch")) {
        let fetch = &mut render.fetch;
        if let Some(v) = parse_count(s, "fetch", "concurrency")? {
            fetch.concurrency = v;
        }
        if let Some(v) = parse_count(s, "fetch", "retry_concurrency")? {
            fetch.retry_concurrency = v;
        }
        if let Some(v) = parse_value(s, "fetch", "retries", "must be a non-negative integer")? {
            fetch.retries_per_pass = v;
        }
        if let Some(v) = parse_millis(s, "fetch", "base_delay_ms")? {
            fetch.base_delay = v;
        }
        if let Some(v) = parse_millis(s, "fetch", "max_delay_ms")? {
            fetch.max_delay = v;
        }
        if let Some(v) = parse_fraction(s, "fetch", "fatal_failure_ratio", 1.0)? {
            fetch.fatal_failure_ratio = v;
        }
        if let Some(v) = parse_count(s, "fetch", "tile_budget")? {
            fetch.page_tile_budget = v;
        }
        if let Some(v) = parse_count(s, "fetch", "border_tile_budget")? {
            fetch.border_tile_budget = v;
        }
        if let Some(v) = parse_count(s, "fetch", "cache_capacity")? {
            fetch.cache_capacity = v;
        }
        if let Some(v) = parse_count(s, "fetch", "batch_size")? {
            fetch.batch_size = v;
        }
        if let Some(v) = parse_count(s, "fetch", "page_workers")? {
            fetch.page_workers = v;
        }
    }

    // [logging] section
    if let Some(s) = ini.section(Some("logging")) {
        if let Some(v) = s.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.directory = expand_tilde(v);
            }
        }
        if let Some(v) = s.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = v.to_string();
            }
        }
    }

    Ok(config)
}

/// Serializes a `ConfigFile` back into INI sections.
pub(super) fn to_ini(config: &ConfigFile) -> Ini {
    let render = &config.render;
    let layout = &render.layout;
    let fetch = &render.fetch;
    let mut ini = Ini::new();

    ini.with_section(Some("render"))
        .set("scale", layout.scale.to_string())
        .set("paper", layout.paper.to_string())
        .set("dpi", layout.dpi.to_string())
        .set("orientation", layout.orientation.to_string())
        .set("layout", layout.mode.map(|m| m.to_string()).unwrap_or_default())
        .set("overlap", layout.overlap.to_string())
        .set("margin", layout.margin.to_string())
        .set("greyscale", render.greyscale.to_string())
        .set("declination", render.declination.to_string());

    ini.with_section(Some("track"))
        .set("color", render.track.color.to_string())
        .set("width", render.track.width.to_string())
        .set("opacity", render.track.opacity.to_string());

    let layers: Vec<&str> = render.overlays.layers.iter().map(|k| k.as_str()).collect();
    let mut overlays = ini.with_section(Some("overlays"));
    overlays
        .set("layers", layers.join(","))
        .set("height_opacity", render.overlays.height_opacity.to_string())
        .set("weak_ice_opacity", render.overlays.weak_ice_opacity.to_string());
    if let Some(f) = render.overlays.height_scale_factor {
        overlays.set("height_scale_factor", f.to_string());
    }

    ini.with_section(Some("output"))
        .set("format", render.format.to_string())
        .set("quality", render.quality.to_string());

    ini.with_section(Some("fetch"))
        .set("concurrency", fetch.concurrency.to_string())
        .set("retry_concurrency", fetch.retry_concurrency.to_string())
        .set("retries", fetch.retries_per_pass.to_string())
        .set("base_delay_ms", fetch.base_delay.as_millis().to_string())
        .set("max_delay_ms", fetch.max_delay.as_millis().to_string())
        .set("fatal_failure_ratio", fetch.fatal_failure_ratio.to_string())
        .set("tile_budget", fetch.page_tile_budget.to_string())
        .set("border_tile_budget", fetch.border_tile_budget.to_string())
        .set("cache_capacity", fetch.cache_capacity.to_string())
        .set("batch_size", fetch.batch_size.to_string())
        .set("page_workers", fetch.page_workers.to_string());

    ini.with_section(Some("logging"))
        .set("directory", config.logging.directory.display().to_string())
        .set("file", config.logging.file.clone());

    ini
}

fn expand_tilde(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}
