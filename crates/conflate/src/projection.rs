//! WGS84 longitude/latitude to metric map projections.
//!
//! Entities carry GeoJSON in degrees; distances are measured after
//! projecting to one of the metric systems below so that `demi_distance`
//! is in meters. `Planar` leaves coordinates untouched. Datum shifts are
//! not applied: an ED50 zone only swaps the ellipsoid.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

use crate::geometry::Coord;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipsoid {
    /// Semi-major axis, meters.
    pub a: f64,
    /// Flattening.
    pub f: f64,
}

impl Ellipsoid {
    pub const WGS84: Ellipsoid = Ellipsoid {
        a: 6_378_137.0,
        f: 1.0 / 298.257_223_563,
    };
    pub const GRS80: Ellipsoid = Ellipsoid {
        a: 6_378_137.0,
        f: 1.0 / 298.257_222_101,
    };
    pub const INTERNATIONAL_1924: Ellipsoid = Ellipsoid {
        a: 6_378_388.0,
        f: 1.0 / 297.0,
    };

    fn e2(&self) -> f64 {
        self.f * (2.0 - self.f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Projection {
    /// Coordinates are used as given.
    #[default]
    Planar,
    /// EPSG:3857, spherical.
    WebMercator,
    /// Universal Transverse Mercator zone.
    Utm {
        zone: u8,
        south: bool,
        ellipsoid: Ellipsoid,
    },
    /// EPSG:2154, RGF93 / Lambert-93.
    Lambert93,
}

const UTM_K0: f64 = 0.9996;
const UTM_FALSE_EASTING: f64 = 500_000.0;
const UTM_FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

impl Projection {
    /// Projection for an EPSG code, `None` when unsupported. 4326 is the
    /// input system itself.
    pub fn from_srid(srid: u32) -> Option<Projection> {
        let utm = |zone: u32, south, ellipsoid| Projection::Utm {
            zone: zone as u8,
            south,
            ellipsoid,
        };
        match srid {
            4326 => Some(Self::Planar),
            3857 | 900_913 => Some(Self::WebMercator),
            2154 => Some(Self::Lambert93),
            32601..=32660 => Some(utm(srid - 32600, false, Ellipsoid::WGS84)),
            32701..=32760 => Some(utm(srid - 32700, true, Ellipsoid::WGS84)),
            23028..=23038 => Some(utm(srid - 23000, false, Ellipsoid::INTERNATIONAL_1924)),
            _ => None,
        }
    }

    pub fn is_planar(&self) -> bool {
        matches!(self, Self::Planar)
    }

    /// [longitude, latitude] in degrees to [x, y] in meters.
    pub fn forward(&self, c: Coord) -> Coord {
        let (lon, lat) = (c[0].to_radians(), c[1].to_radians());
        match *self {
            Self::Planar => c,
            Self::WebMercator => {
                let r = Ellipsoid::WGS84.a;
                [r * lon, r * (FRAC_PI_4 + lat / 2.0).tan().ln()]
            }
            Self::Utm {
                zone,
                south,
                ellipsoid,
            } => {
                let [x, y] = tm_forward(&ellipsoid, utm_central_meridian(zone), lon, lat);
                let northing = if south { UTM_FALSE_NORTHING_SOUTH } else { 0.0 };
                [x + UTM_FALSE_EASTING, y + northing]
            }
            Self::Lambert93 => Lcc::lambert93().forward(lon, lat),
        }
    }

    /// Inverse of [`Projection::forward`].
    pub fn inverse(&self, c: Coord) -> Coord {
        let [lon, lat] = match *self {
            Self::Planar => return c,
            Self::WebMercator => {
                let r = Ellipsoid::WGS84.a;
                [c[0] / r, 2.0 * (c[1] / r).exp().atan() - FRAC_PI_2]
            }
            Self::Utm {
                zone,
                south,
                ellipsoid,
            } => {
                let northing = if south { UTM_FALSE_NORTHING_SOUTH } else { 0.0 };
                tm_inverse(
                    &ellipsoid,
                    utm_central_meridian(zone),
                    c[0] - UTM_FALSE_EASTING,
                    c[1] - northing,
                )
            }
            Self::Lambert93 => Lcc::lambert93().inverse(c[0], c[1]),
        };
        [lon.to_degrees(), lat.to_degrees()]
    }
}

fn utm_central_meridian(zone: u8) -> f64 {
    (f64::from(zone) * 6.0 - 183.0).to_radians()
}

// ---------------------------------------------------------------------------
// Transverse Mercator (Snyder series)
// ---------------------------------------------------------------------------

fn meridian_arc(e: &Ellipsoid, lat: f64) -> f64 {
    let e2 = e.e2();
    let (e4, e6) = (e2 * e2, e2 * e2 * e2);
    e.a * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * lat
        - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * lat).sin()
        + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * lat).sin()
        - (35.0 * e6 / 3072.0) * (6.0 * lat).sin())
}

/// Radians in, meters out, no false origin.
fn tm_forward(e: &Ellipsoid, lon0: f64, lon: f64, lat: f64) -> Coord {
    let e2 = e.e2();
    let ep2 = e2 / (1.0 - e2);
    let (sin, cos, tan) = (lat.sin(), lat.cos(), lat.tan());

    let n = e.a / (1.0 - e2 * sin * sin).sqrt();
    let t = tan * tan;
    let c = ep2 * cos * cos;
    let a = (lon - lon0) * cos;
    let m = meridian_arc(e, lat);

    let x = UTM_K0
        * n
        * (a + (1.0 - t + c) * a.powi(3) / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a.powi(5) / 120.0);
    let y = UTM_K0
        * (m + n
            * tan
            * (a * a / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c * c) * a.powi(4) / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a.powi(6) / 720.0));
    [x, y]
}

/// Meters in (no false origin), radians out.
fn tm_inverse(e: &Ellipsoid, lon0: f64, x: f64, y: f64) -> Coord {
    let e2 = e.e2();
    let ep2 = e2 / (1.0 - e2);
    let (e4, e6) = (e2 * e2, e2 * e2 * e2);

    let mu = y / UTM_K0 / (e.a * (1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));
    let e1 = (1.0 - (1.0 - e2).sqrt()) / (1.0 + (1.0 - e2).sqrt());
    let lat1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

    let (sin1, cos1, tan1) = (lat1.sin(), lat1.cos(), lat1.tan());
    let c1 = ep2 * cos1 * cos1;
    let t1 = tan1 * tan1;
    let w = 1.0 - e2 * sin1 * sin1;
    let n1 = e.a / w.sqrt();
    let r1 = e.a * (1.0 - e2) / w.powf(1.5);
    let d = x / (n1 * UTM_K0);

    let lat = lat1
        - (n1 * tan1 / r1)
            * (d * d / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d.powi(4) / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * ep2 - 3.0 * c1 * c1)
                    * d.powi(6)
                    / 720.0);
    let lon = lon0
        + (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1) * d.powi(5)
                / 120.0)
            / cos1;
    [lon, lat]
}

// ---------------------------------------------------------------------------
// Lambert conformal conic, two standard parallels
// ---------------------------------------------------------------------------

struct Lcc {
    e: f64,
    a: f64,
    lon0: f64,
    n: f64,
    f: f64,
    rho0: f64,
    false_easting: f64,
    false_northing: f64,
}

impl Lcc {
    fn lambert93() -> Self {
        Self::new(
            &Ellipsoid::GRS80,
            3.0_f64.to_radians(),
            46.5_f64.to_radians(),
            49.0_f64.to_radians(),
            44.0_f64.to_radians(),
            700_000.0,
            6_600_000.0,
        )
    }

    fn new(
        ellipsoid: &Ellipsoid,
        lon0: f64,
        lat0: f64,
        lat1: f64,
        lat2: f64,
        false_easting: f64,
        false_northing: f64,
    ) -> Self {
        let e = ellipsoid.e2().sqrt();
        let m = |lat: f64| lat.cos() / (1.0 - e * e * lat.sin().powi(2)).sqrt();
        let (m1, m2) = (m(lat1), m(lat2));
        let (t0, t1, t2) = (lcc_t(e, lat0), lcc_t(e, lat1), lcc_t(e, lat2));
        let n = (m1.ln() - m2.ln()) / (t1.ln() - t2.ln());
        let f = m1 / (n * t1.powf(n));
        Self {
            e,
            a: ellipsoid.a,
            lon0,
            n,
            f,
            rho0: ellipsoid.a * f * t0.powf(n),
            false_easting,
            false_northing,
        }
    }

    fn forward(&self, lon: f64, lat: f64) -> Coord {
        let rho = self.a * self.f * lcc_t(self.e, lat).powf(self.n);
        let theta = self.n * (lon - self.lon0);
        [
            self.false_easting + rho * theta.sin(),
            self.false_northing + self.rho0 - rho * theta.cos(),
        ]
    }

    fn inverse(&self, x: f64, y: f64) -> Coord {
        let dx = x - self.false_easting;
        let dy = self.rho0 - (y - self.false_northing);
        let rho = self.n.signum() * dx.hypot(dy);
        let t = (rho / (self.a * self.f)).powf(1.0 / self.n);
        let theta = (self.n.signum() * dx).atan2(self.n.signum() * dy);

        let mut lat = FRAC_PI_2 - 2.0 * t.atan();
        for _ in 0..15 {
            let es = self.e * lat.sin();
            lat = FRAC_PI_2 - 2.0 * (t * ((1.0 - es) / (1.0 + es)).powf(self.e / 2.0)).atan();
        }
        [theta / self.n + self.lon0, lat]
    }
}

fn lcc_t(e: f64, lat: f64) -> f64 {
    let es = e * lat.sin();
    (FRAC_PI_4 - lat / 2.0).tan() / ((1.0 - es) / (1.0 + es)).powf(e / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Coord, b: Coord, tolerance: f64) -> bool {
        (a[0] - b[0]).abs() < tolerance && (a[1] - b[1]).abs() < tolerance
    }

    fn planar_distance(p: &Projection, a: Coord, b: Coord) -> f64 {
        let (a, b) = (p.forward(a), p.forward(b));
        (a[0] - b[0]).hypot(a[1] - b[1])
    }

    #[test]
    fn supported_srids() {
        assert_eq!(Projection::from_srid(4326), Some(Projection::Planar));
        assert_eq!(Projection::from_srid(2154), Some(Projection::Lambert93));
        assert_eq!(
            Projection::from_srid(32631),
            Some(Projection::Utm {
                zone: 31,
                south: false,
                ellipsoid: Ellipsoid::WGS84
            })
        );
        assert!(matches!(
            Projection::from_srid(23031),
            Some(Projection::Utm { zone: 31, .. })
        ));
        assert_eq!(Projection::from_srid(27700), None);
    }

    #[test]
    fn lambert93_origin() {
        let p = Projection::Lambert93;
        assert!(close(p.forward([3.0, 46.5]), [700_000.0, 6_600_000.0], 1e-3));
    }

    #[test]
    fn utm_central_meridian_on_equator() {
        let p = Projection::from_srid(32631).unwrap();
        assert!(close(p.forward([3.0, 0.0]), [500_000.0, 0.0], 1e-6));
        let south = Projection::from_srid(32731).unwrap();
        assert!(close(south.forward([3.0, 0.0]), [500_000.0, 10_000_000.0], 1e-6));
    }

    #[test]
    fn web_mercator_antimeridian() {
        let x = Projection::WebMercator.forward([180.0, 0.0])[0];
        assert!((x - 20_037_508.342_789).abs() < 1e-3);
    }

    #[test]
    fn one_degree_of_latitude_is_about_111_km() {
        for p in [Projection::Lambert93, Projection::from_srid(32630).unwrap()] {
            let d = planar_distance(&p, [-1.0, 43.0], [-1.0, 44.0]);
            assert!((110_000.0..112_500.0).contains(&d), "{p:?}: {d}");
        }
    }

    #[test]
    fn inverse_undoes_forward() {
        let c = [2.3522, 48.8566];
        for p in [
            Projection::Planar,
            Projection::WebMercator,
            Projection::Lambert93,
            Projection::from_srid(32631).unwrap(),
            Projection::from_srid(23031).unwrap(),
        ] {
            let back = p.inverse(p.forward(c));
            assert!(close(back, c, 1e-7), "{p:?}: {back:?}");
        }
    }
}
