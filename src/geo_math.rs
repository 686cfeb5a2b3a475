//! Great-circle distance on a spherical Earth.

/// Mean Earth radius (IUGG) in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Haversine distance between two (lat, lon) pairs in degrees, in kilometres.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    // Rounding can push `a` a hair past 1.0 for antipodal points
    let c = 2.0 * a.sqrt().atan2((1.0 - a).max(0.0).sqrt());
    EARTH_RADIUS_KM * c
}

/// Haversine distance in meters.
pub fn distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    haversine_km(lat1, lon1, lat2, lon2) * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_zero_distance() {
        assert_eq!(distance_m(47.3769, 8.5417, 47.3769, 8.5417), 0.0);
    }

    #[test]
    fn test_symmetric() {
        let ab = distance_m(51.5074, -0.1278, 48.8566, 2.3522);
        let ba = distance_m(48.8566, 2.3522, 51.5074, -0.1278);
        assert_eq!(ab, ba);
    }

    #[test]
    fn test_london_paris() {
        // Roughly 343.5 km on the mean sphere
        let km = haversine_km(51.5074, -0.1278, 48.8566, 2.3522);
        assert_relative_eq!(km, 343.5, max_relative = 0.005);
    }

    #[test]
    fn test_one_degree_latitude() {
        let expected = EARTH_RADIUS_KM * 1000.0 * 1.0_f64.to_radians();
        assert_relative_eq!(distance_m(0.0, 0.0, 1.0, 0.0), expected, max_relative = 1e-12);
    }

    #[test]
    fn test_antipodal_points() {
        let half_circumference = std::f64::consts::PI * EARTH_RADIUS_KM;
        assert_relative_eq!(haversine_km(0.0, 0.0, 0.0, 180.0), half_circumference, max_relative = 1e-9);
    }
}
