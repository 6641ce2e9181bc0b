//! Lecture du fichier .prj (WKT ESRI/OGC) pour en déduire le code EPSG

use std::sync::LazyLock;

use regex::Regex;

use crate::GeoError;

/// Systèmes géographiques reconnus par leur nom WKT
const GEOGRAPHIC: &[(&str, u32)] = &[
    ("GCS_WGS_1984", 4326),
    ("WGS 84", 4326),
    ("WGS84", 4326),
    ("GCS_SIRGAS_2000", 4674),
    ("SIRGAS 2000", 4674),
    ("SIRGAS2000", 4674),
    ("GCS_South_American_1969", 4618),
    ("SAD69", 4618),
];

static AUTHORITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"AUTHORITY\[\s*"EPSG"\s*,\s*"?(\d+)"?\s*\]\s*\]\s*$"#).expect("valid regex")
});

static ROOT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*(PROJCS|GEOGCS)\[\s*"([^"]+)""#).expect("valid regex"));

static UTM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(WGS[ _]?(?:19)?84|SIRGAS[ _]?2000|SAD[ _]?(?:19)?69).*UTM[ _]zone[ _](\d{1,2})\s*([NS])")
        .expect("valid regex")
});

/// Déduit l'EPSG d'un WKT de projection
pub fn parse(wkt: &str) -> Result<u32, GeoError> {
    let Some(root) = ROOT_RE.captures(wkt) else {
        return Err(GeoError::UnknownProjection(truncate(wkt)));
    };

    // AUTHORITY de premier niveau : juste avant le crochet fermant final
    if let Some(epsg) = AUTHORITY_RE
        .captures(wkt)
        .and_then(|c| c[1].parse::<u32>().ok())
    {
        return Ok(epsg);
    }

    let name = &root[2];
    if root[1].eq_ignore_ascii_case("PROJCS") {
        return utm_epsg(name).ok_or_else(|| GeoError::UnknownProjection(name.to_string()));
    }

    GEOGRAPHIC
        .iter()
        .find(|(label, _)| name.eq_ignore_ascii_case(label))
        .map(|&(_, epsg)| epsg)
        .ok_or_else(|| GeoError::UnknownProjection(name.to_string()))
}

/// EPSG d'une projection UTM d'après son nom (`WGS_1984_UTM_Zone_23S`, ...)
fn utm_epsg(name: &str) -> Option<u32> {
    let caps = UTM_RE.captures(name)?;
    let zone: u32 = caps[2].parse().ok()?;
    if !(1..=60).contains(&zone) {
        return None;
    }
    let south = caps[3].eq_ignore_ascii_case("S");
    let datum = caps[1].to_ascii_uppercase();

    let epsg = if datum.starts_with("WGS") {
        if south {
            32700 + zone
        } else {
            32600 + zone
        }
    } else if datum.starts_with("SIRGAS") {
        match (south, zone) {
            (true, 17..=25) => 31960 + zone,
            (false, 17..=22) => 31954 + zone,
            _ => return None,
        }
    } else {
        match (south, zone) {
            (true, 17..=25) => 29170 + zone,
            (false, 18..=22) => 29150 + zone,
            _ => return None,
        }
    };
    Some(epsg)
}

fn truncate(s: &str) -> String {
    s.chars().take(60).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_esri_geographic() {
        let wkt = r#"GEOGCS["GCS_SIRGAS_2000",DATUM["D_SIRGAS_2000",SPHEROID["GRS_1980",6378137.0,298.257222101]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;
        assert_eq!(parse(wkt).unwrap(), 4674);

        let wkt = r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;
        assert_eq!(parse(wkt).unwrap(), 4326);
    }

    #[test]
    fn test_parse_esri_utm() {
        let wkt = r#"PROJCS["WGS_1984_UTM_Zone_23S",GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]],PROJECTION["Transverse_Mercator"],UNIT["Meter",1.0]]"#;
        assert_eq!(parse(wkt).unwrap(), 32723);

        let wkt = r#"PROJCS["SIRGAS_2000_UTM_Zone_22S",GEOGCS["GCS_SIRGAS_2000",DATUM["D_SIRGAS_2000",SPHEROID["GRS_1980",6378137.0,298.257222101]]],PROJECTION["Transverse_Mercator"]]"#;
        assert_eq!(parse(wkt).unwrap(), 31982);
    }

    #[test]
    fn test_parse_ogc_authority() {
        let wkt = r#"PROJCS["SIRGAS 2000 / UTM zone 23S",GEOGCS["SIRGAS 2000",AUTHORITY["EPSG","4674"]],PROJECTION["Transverse_Mercator"],AUTHORITY["EPSG","31983"]]"#;
        assert_eq!(parse(wkt).unwrap(), 31983);
    }

    #[test]
    fn test_parse_unknown() {
        assert!(matches!(
            parse(r#"GEOGCS["GCS_Unknown_Datum"]"#),
            Err(GeoError::UnknownProjection(_))
        ));
        assert!(parse("garbage").is_err());
    }
}
