//! Parsing of inline coordinate markers (`{{coord|...}}`) into decimal degrees

use crate::{DataError, Result, utils};
use geo::Point;

/// Parse the coordinates of a coordinate marker
///
/// Accepted positional forms (named `key=value` and `key:value` parameters are ignored):
/// - `{{coord|lat|lon}}` in decimal degrees
/// - `{{coord|d|N|d|E}}`
/// - `{{coord|d|m|N|d|m|E}}`
/// - `{{coord|d|m|s|N|d|m|s|E}}`
///
/// Hemisphere letters `S` and `W` negate their side.
///
/// # Returns
/// A `Point<f64>` with x = longitude and y = latitude
pub fn parse_coord_template(marker: &str) -> Result<Point<f64>> {
    let inner = marker
        .trim()
        .trim_start_matches("{{")
        .trim_end_matches("}}");
    let mut params = inner.split('|').map(str::trim);

    let name = params.next().unwrap_or_default();
    if !name.eq_ignore_ascii_case("coord") {
        return Err(invalid(marker, "not a coord marker"));
    }

    let positional: Vec<&str> = params
        .filter(|p| !p.is_empty() && !p.contains('=') && !p.contains(':'))
        .collect();

    let (lat, lon) = match positional.iter().position(|p| is_hemisphere(p, "N", "S")) {
        None => {
            let [lat, lon, ..] = positional.as_slice() else {
                return Err(invalid(marker, "expected latitude and longitude"));
            };
            (parse_number(lat, marker)?, parse_number(lon, marker)?)
        }
        Some(ns) => {
            let rest = &positional[ns + 1..];
            let ew = rest
                .iter()
                .position(|p| is_hemisphere(p, "E", "W"))
                .ok_or_else(|| invalid(marker, "missing E/W hemisphere"))?;

            let lat = sexagesimal(&positional[..ns], marker)?;
            let lon = sexagesimal(&rest[..ew], marker)?;
            (
                signed(lat, positional[ns], "S"),
                signed(lon, rest[ew], "W"),
            )
        }
    };

    if !(-90.0..=90.0).contains(&lat) {
        return Err(invalid(marker, "latitude out of range"));
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(invalid(marker, "longitude out of range"));
    }

    Ok(utils::lat_lon(lat, lon))
}

fn invalid(marker: &str, reason: &str) -> DataError {
    DataError::InvalidCoordinate(format!("{reason} in {marker:?}"))
}

fn is_hemisphere(token: &str, positive: &str, negative: &str) -> bool {
    token.eq_ignore_ascii_case(positive) || token.eq_ignore_ascii_case(negative)
}

fn signed(value: f64, hemisphere: &str, negative: &str) -> f64 {
    if hemisphere.eq_ignore_ascii_case(negative) {
        -value
    } else {
        value
    }
}

fn parse_number(token: &str, marker: &str) -> Result<f64> {
    token
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| invalid(marker, &format!("{token:?} is not a number")))
}

/// Degrees, minutes and seconds (the last two optional) to decimal degrees
fn sexagesimal(components: &[&str], marker: &str) -> Result<f64> {
    if components.is_empty() || components.len() > 3 {
        return Err(invalid(marker, "expected 1 to 3 components per axis"));
    }

    let mut value = 0.0;
    let mut unit = 1.0;
    for (i, token) in components.iter().enumerate() {
        let component = parse_number(token, marker)?;
        if i > 0 && !(0.0..60.0).contains(&component) {
            return Err(invalid(marker, "minutes and seconds must be in [0, 60)"));
        }
        value += component / unit;
        unit *= 60.0;
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(marker: &str) -> (f64, f64) {
        let point = parse_coord_template(marker).unwrap();
        (point.y(), point.x())
    }

    fn approx(actual: (f64, f64), expected: (f64, f64)) {
        assert!(
            (actual.0 - expected.0).abs() < 1e-9 && (actual.1 - expected.1).abs() < 1e-9,
            "{actual:?} != {expected:?}"
        );
    }

    #[test]
    fn test_decimal() {
        approx(parse("{{coord|45.07|7.69|display=title}}"), (45.07, 7.69));
        approx(parse("{{Coord|-33.86|151.21}}"), (-33.86, 151.21));
    }

    #[test]
    fn test_degrees_minutes_seconds() {
        approx(
            parse("{{coord|51|30|26|N|0|7|39|W|region:GB|display=title}}"),
            (51.0 + 30.0 / 60.0 + 26.0 / 3600.0, -(7.0 / 60.0 + 39.0 / 3600.0)),
        );
    }

    #[test]
    fn test_degrees_minutes_and_degrees_only() {
        approx(
            parse("{{coord|33|52|S|151|12|E|type:city|display=title}}"),
            (-(33.0 + 52.0 / 60.0), 151.0 + 12.0 / 60.0),
        );
        approx(parse("{{coord|12.5|N|3.25|e|display=title}}"), (12.5, 3.25));
    }

    #[test]
    fn test_invalid_markers() {
        let bad = [
            "{{location|1|2}}",
            "{{coord|45.0|display=title}}",
            "{{coord|north|east}}",
            "{{coord|51|30|N|0|7}}",
            "{{coord|51|75|N|0|7|W}}",
            "{{coord|1|2|3|4|N|0|E}}",
            "{{coord|95.0|10.0}}",
            "{{coord|10.0|190.0}}",
        ];
        for marker in bad {
            assert!(
                matches!(
                    parse_coord_template(marker),
                    Err(DataError::InvalidCoordinate(_))
                ),
                "{marker} should be rejected"
            );
        }
    }
}
