//! projection.rs — azimuthal equidistant projection, one frame per burst.
//!
//! Base stations hear a burst over at most a few tens of kilometres, so each
//! burst gets a planar frame centred on its receiver centroid. Forward maps
//! (lat, lng) degrees to (x, y) metres; inverse maps a solved position back.
//! The frame is only meaningful while the receiver set spans far less than
//! the Earth radius (no antipodal stations).

use lora_types::EARTH_RADIUS_M;

/// Angular distances below this are treated as "at the centre" — the
/// `c / sin c` scale is 0/0 there and the projected point is the origin.
const DEGENERATE_ARC_RAD: f64 = 1e-12;

/// Local planar frame centred on `(center_lat, center_lng)`.
#[derive(Debug, Clone, Copy)]
pub struct Projection {
    center_lat: f64,
    center_lng: f64,
    lat_c: f64,
    lng_c: f64,
}

impl Projection {
    /// Build a frame centred on the given coordinates (decimal degrees).
    pub fn new(center_lat: f64, center_lng: f64) -> Self {
        Self {
            center_lat,
            center_lng,
            lat_c: center_lat.to_radians(),
            lng_c: center_lng.to_radians(),
        }
    }

    /// Frame centre as `(lat, lng)` degrees.
    pub fn center(&self) -> (f64, f64) {
        (self.center_lat, self.center_lng)
    }

    /// Project `(lat, lng)` degrees into the planar frame, metres.
    pub fn forward(&self, lat: f64, lng: f64) -> (f64, f64) {
        let lat = lat.to_radians();
        let lng = lng.to_radians();
        let cos_dl = (lng - self.lng_c).cos();

        // angular distance from the frame centre
        let c = clamp_unit(
            self.lat_c.sin() * lat.sin() + self.lat_c.cos() * lat.cos() * cos_dl,
        )
        .acos();
        if c < DEGENERATE_ARC_RAD {
            return (0.0, 0.0);
        }

        let k = c / c.sin();
        let x = k * lat.cos() * (lng - self.lng_c).sin();
        let y = k * (self.lat_c.cos() * lat.sin() - self.lat_c.sin() * lat.cos() * cos_dl);

        (x * EARTH_RADIUS_M, y * EARTH_RADIUS_M)
    }

    /// Map a planar position in metres back to `(lat, lng)` degrees.
    pub fn inverse(&self, x_m: f64, y_m: f64) -> (f64, f64) {
        let x = x_m / EARTH_RADIUS_M;
        let y = y_m / EARTH_RADIUS_M;

        let c = (x * x + y * y).sqrt();
        if c < DEGENERATE_ARC_RAD {
            return (self.center_lat, self.center_lng);
        }

        let lat = clamp_unit(
            c.cos() * self.lat_c.sin() + y * c.sin() * self.lat_c.cos() / c,
        )
        .asin();

        // longitude splits at the poles, where "east of centre" loses meaning
        let lng = if self.center_lat == 90.0 {
            self.lng_c + (-x / y).atan()
        } else if self.center_lat == -90.0 {
            self.lng_c + (x / y).atan()
        } else {
            self.lng_c
                + (x * c.sin() / (c * self.lat_c.cos() * c.cos() - y * self.lat_c.sin() * c.sin()))
                    .atan()
        };

        (lat.to_degrees(), lng.to_degrees())
    }
}

fn clamp_unit(v: f64) -> f64 {
    v.clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centre_projects_to_origin_exactly() {
        let proj = Projection::new(43.05, -70.8);
        assert_eq!(proj.forward(43.05, -70.8), (0.0, 0.0));
        assert_eq!(proj.inverse(0.0, 0.0), (43.05, -70.8));
    }

    #[test]
    fn round_trip_within_a_degree_of_the_centre() {
        let proj = Projection::new(43.05, -70.8);
        for dlat in [-0.9, -0.5, -0.1, 0.0, 0.3, 0.9] {
            for dlng in [-0.9, -0.4, 0.0, 0.2, 0.6, 0.9] {
                let (lat, lng) = (43.05 + dlat, -70.8 + dlng);
                let (x, y) = proj.forward(lat, lng);
                let (lat2, lng2) = proj.inverse(x, y);
                assert!(
                    (lat - lat2).abs() < 1e-7 && (lng - lng2).abs() < 1e-7,
                    "({lat}, {lng}) round-tripped to ({lat2}, {lng2})"
                );
            }
        }
    }

    #[test]
    fn one_degree_of_latitude_is_about_111_km() {
        let proj = Projection::new(43.05, -70.8);
        let (x, y) = proj.forward(44.05, -70.8);
        assert!(x.abs() < 1.0);
        assert!((y - 111_194.0).abs() < 100.0, "got y = {y}");
    }

    #[test]
    fn northern_point_has_positive_y() {
        let proj = Projection::new(43.05, -70.8);
        let (_, y_north) = proj.forward(43.10, -70.8);
        let (x_east, _) = proj.forward(43.05, -70.7);
        assert!(y_north > 0.0);
        assert!(x_east > 0.0);
    }
}
