//! Projection Web Mercator (EPSG:3857)

use super::ellipsoid::Ellipsoid;
use super::Geographic;

/// Convertit coordonnées géographiques vers Web Mercator (EPSG:3857)
pub fn geographic_to_web_mercator(geo: Geographic) -> (f64, f64) {
    // Modèle sphérique de rayon équatorial
    let r = Ellipsoid::WGS84.a;

    // Limiter la latitude pour éviter l'infini
    let lat = geo.lat.clamp(-85.0_f64.to_radians(), 85.0_f64.to_radians());

    let x = r * geo.lon;
    let y = r * (std::f64::consts::FRAC_PI_4 + lat / 2.0).tan().ln();

    (x, y)
}

/// Convertit Web Mercator vers coordonnées géographiques
pub fn web_mercator_to_geographic(x: f64, y: f64) -> Geographic {
    let r = Ellipsoid::WGS84.a;
    let lon = x / r;
    let lat = 2.0 * (y / r).exp().atan() - std::f64::consts::FRAC_PI_2;
    Geographic::new(lon, lat)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ribeirao_preto_to_web_mercator() {
        // Ribeirão Preto : -47.81°, -21.18°
        let (x, y) = geographic_to_web_mercator(Geographic::from_degrees(-47.81, -21.18));
        assert!((x - (-5_322_100.0)).abs() < 1000.0, "x={}", x);
        assert!((y - (-2_413_000.0)).abs() < 5000.0, "y={}", y);

        let (lon, lat) = web_mercator_to_geographic(x, y).to_degrees();
        assert!((lon - (-47.81)).abs() < 1e-6);
        assert!((lat - (-21.18)).abs() < 1e-6);
    }
}
