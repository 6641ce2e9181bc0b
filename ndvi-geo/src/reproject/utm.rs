//! Projection UTM (Universal Transverse Mercator)
//!
//! Formules de Snyder (USGS Professional Paper 1395), précises au
//! centimètre à l'intérieur d'une zone.

use super::ellipsoid::Ellipsoid;
use super::Geographic;
use crate::GeoError;

/// Facteur d'échelle
const K0: f64 = 0.9996;
/// False easting
const X0: f64 = 500_000.0;
/// False northing (hémisphère sud)
const Y0_SOUTH: f64 = 10_000_000.0;

/// Zone UTM d'une projection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UtmZone {
    pub zone: u32,
    pub south: bool,
    pub ellipsoid: Ellipsoid,
}

impl UtmZone {
    /// Code EPSG correspondant (WGS84 ou SIRGAS 2000)
    pub fn epsg(&self) -> u32 {
        match (self.ellipsoid == Ellipsoid::GRS80, self.south) {
            (false, true) => 32700 + self.zone,
            (false, false) => 32600 + self.zone,
            (true, true) => 31960 + self.zone,
            (true, false) => 31954 + self.zone,
        }
    }
}

/// Numéro de zone UTM d'une position (degrés), exceptions Norvège et Svalbard incluses
pub fn zone_number(lon: f64, lat: f64) -> u32 {
    if (56.0..64.0).contains(&lat) && (3.0..12.0).contains(&lon) {
        return 32;
    }
    if (72.0..84.0).contains(&lat) && lon >= 0.0 {
        if lon < 9.0 {
            return 31;
        } else if lon < 21.0 {
            return 33;
        } else if lon < 33.0 {
            return 35;
        } else if lon < 42.0 {
            return 37;
        }
    }
    let lon = if lon >= 180.0 { lon - 360.0 } else { lon };
    (((lon + 180.0) / 6.0).floor() as i64 + 1).clamp(1, 60) as u32
}

/// Longitude centrale d'une zone (radians)
fn central_meridian(zone: u32) -> f64 {
    ((zone as f64 - 1.0) * 6.0 - 180.0 + 3.0).to_radians()
}

/// Convertit coordonnées géographiques vers UTM
pub fn geographic_to_utm(geo: Geographic, utm: UtmZone) -> Result<(f64, f64), GeoError> {
    let a = utm.ellipsoid.a;
    let e2 = utm.ellipsoid.e2();
    let ep2 = utm.ellipsoid.ep2();

    let phi = geo.lat;
    let sin_phi = phi.sin();
    let cos_phi = phi.cos();
    let tan_phi = phi.tan();

    let n = a / (1.0 - e2 * sin_phi.powi(2)).sqrt();
    let t = tan_phi.powi(2);
    let c = ep2 * cos_phi.powi(2);
    let aa = cos_phi * (geo.lon - central_meridian(utm.zone));

    // Longueur de l'arc de méridien
    let m = a
        * ((1.0 - e2 / 4.0 - 3.0 * e2.powi(2) / 64.0 - 5.0 * e2.powi(3) / 256.0) * phi
            - (3.0 * e2 / 8.0 + 3.0 * e2.powi(2) / 32.0 + 45.0 * e2.powi(3) / 1024.0)
                * (2.0 * phi).sin()
            + (15.0 * e2.powi(2) / 256.0 + 45.0 * e2.powi(3) / 1024.0) * (4.0 * phi).sin()
            - (35.0 * e2.powi(3) / 3072.0) * (6.0 * phi).sin());

    let x = K0
        * n
        * (aa
            + (1.0 - t + c) * aa.powi(3) / 6.0
            + (5.0 - 18.0 * t + t.powi(2) + 72.0 * c - 58.0 * ep2) * aa.powi(5) / 120.0)
        + X0;

    let y = K0
        * (m + n
            * tan_phi
            * (aa.powi(2) / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c.powi(2)) * aa.powi(4) / 24.0
                + (61.0 - 58.0 * t + t.powi(2) + 600.0 * c - 330.0 * ep2) * aa.powi(6) / 720.0))
        + if utm.south { Y0_SOUTH } else { 0.0 };

    if !x.is_finite() || !y.is_finite() {
        return Err(GeoError::reprojection(
            4326,
            utm.epsg(),
            format!("non-finite UTM result for ({}, {})", geo.lon, geo.lat),
        ));
    }
    Ok((x, y))
}

/// Convertit UTM vers coordonnées géographiques
pub fn utm_to_geographic(x: f64, y: f64, utm: UtmZone) -> Result<Geographic, GeoError> {
    let a = utm.ellipsoid.a;
    let e2 = utm.ellipsoid.e2();
    let ep2 = utm.ellipsoid.ep2();

    let x = x - X0;
    let y = y - if utm.south { Y0_SOUTH } else { 0.0 };

    // Latitude du pied de la perpendiculaire
    let m = y / K0;
    let mu = m / (a * (1.0 - e2 / 4.0 - 3.0 * e2.powi(2) / 64.0 - 5.0 * e2.powi(3) / 256.0));
    let e1 = (1.0 - (1.0 - e2).sqrt()) / (1.0 + (1.0 - e2).sqrt());

    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1.powi(2) / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

    let sin_phi1 = phi1.sin();
    let cos_phi1 = phi1.cos();
    let tan_phi1 = phi1.tan();

    let n1 = a / (1.0 - e2 * sin_phi1.powi(2)).sqrt();
    let t1 = tan_phi1.powi(2);
    let c1 = ep2 * cos_phi1.powi(2);
    let r1 = a * (1.0 - e2) / (1.0 - e2 * sin_phi1.powi(2)).powf(1.5);
    let d = x / (n1 * K0);

    let lat = phi1
        - (n1 * tan_phi1 / r1)
            * (d.powi(2) / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1.powi(2) - 9.0 * ep2) * d.powi(4) / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1.powi(2)
                    - 252.0 * ep2
                    - 3.0 * c1.powi(2))
                    * d.powi(6)
                    / 720.0);

    let lon = central_meridian(utm.zone)
        + (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1.powi(2) + 8.0 * ep2 + 24.0 * t1.powi(2))
                * d.powi(5)
                / 120.0)
            / cos_phi1;

    if !lat.is_finite() || !lon.is_finite() {
        return Err(GeoError::reprojection(
            utm.epsg(),
            4326,
            format!("non-finite geographic result for ({}, {})", x + X0, y),
        ));
    }
    Ok(Geographic::new(lon, lat))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone_23s() -> UtmZone {
        UtmZone {
            zone: 23,
            south: true,
            ellipsoid: Ellipsoid::WGS84,
        }
    }

    #[test]
    fn test_epsg() {
        assert_eq!(zone_23s().epsg(), 32723);
        let sirgas = UtmZone {
            ellipsoid: Ellipsoid::GRS80,
            ..zone_23s()
        };
        assert_eq!(sirgas.epsg(), 31983);
    }

    #[test]
    fn test_zone_number() {
        // Ribeirão Preto
        assert_eq!(zone_number(-47.81, -21.18), 23);
        // Goiânia
        assert_eq!(zone_number(-49.25, -16.68), 22);
        assert_eq!(zone_number(-180.0, 0.0), 1);
        assert_eq!(zone_number(179.9, 0.0), 60);
        // Norvège / Svalbard
        assert_eq!(zone_number(5.0, 60.0), 32);
        assert_eq!(zone_number(15.0, 78.0), 33);
    }

    #[test]
    fn test_forward_central_meridian() {
        // Sur le méridien central, x = false easting
        let (x, y) = geographic_to_utm(Geographic::from_degrees(-45.0, -21.0), zone_23s()).unwrap();
        assert!((x - 500_000.0).abs() < 1e-6, "x={}", x);
        // ~ 2 323 km au sud de l'équateur
        assert!((y - 7_677_000.0).abs() < 2_000.0, "y={}", y);
    }

    #[test]
    fn test_roundtrip() {
        let utm = zone_23s();
        let geo = Geographic::from_degrees(-47.81, -21.18);
        let (x, y) = geographic_to_utm(geo, utm).unwrap();
        let back = utm_to_geographic(x, y, utm).unwrap();
        let (lon, lat) = back.to_degrees();

        assert!((lon - (-47.81)).abs() < 1e-6, "lon={}", lon);
        assert!((lat - (-21.18)).abs() < 1e-6, "lat={}", lat);
    }
}
