//! Annual sun-position sampling grid.
//!
//! A year of sun positions is covered by sweeping the solar declination
//! across its annual range (one row per day sample) and the hour angle across
//! a full day (one column per hour sample). Positions below the horizon stay
//! in the grid so that the table keeps its rectangular shape; the optics
//! engine reports zero efficiency there.

use beamdown_optics::SunPositionSample;

/// Extreme solar declination over a year (deg).
pub const MAX_DECLINATION_DEG: f64 = 23.45;

/// `n` evenly spaced values from `start` to `end` inclusive. A single value
/// sits at the midpoint.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![0.5 * (start + end)],
        _ => (0..n)
            .map(|i| start + (end - start) * i as f64 / (n - 1) as f64)
            .collect(),
    }
}

/// Solar elevation and azimuth (deg) for a site latitude, declination and
/// hour angle.
///
/// $\sin\alpha = \sin\phi\sin\delta + \cos\phi\cos\delta\cos\omega$; the
/// azimuth is measured clockwise from north, in [0, 360).
pub fn solar_position(latitude_deg: f64, declination_deg: f64, hour_angle_deg: f64) -> (f64, f64) {
    let phi = latitude_deg.to_radians();
    let delta = declination_deg.to_radians();
    let omega = hour_angle_deg.to_radians();

    let sin_alt = phi.sin() * delta.sin() + phi.cos() * delta.cos() * omega.cos();
    let elevation = sin_alt.clamp(-1.0, 1.0).asin();

    let east = -delta.cos() * omega.sin();
    let north = delta.sin() * phi.cos() - delta.cos() * omega.cos() * phi.sin();
    let azimuth = east.atan2(north).to_degrees().rem_euclid(360.0);

    (elevation.to_degrees(), azimuth)
}

/// The `n_days` × `n_hours` grid of sampled sun positions for one site.
#[derive(Debug, Clone, PartialEq)]
pub struct SunGrid {
    pub latitude_deg: f64,
    /// Row axis (deg).
    pub declinations: Vec<f64>,
    /// Column axis (deg).
    pub hour_angles: Vec<f64>,
    /// Row-major samples.
    pub samples: Vec<SunPositionSample>,
}

impl SunGrid {
    pub fn annual(latitude_deg: f64, n_days: usize, n_hours: usize) -> Self {
        let declinations = linspace(-MAX_DECLINATION_DEG, MAX_DECLINATION_DEG, n_days);
        let hour_angles = linspace(-180.0, 180.0, n_hours);

        let mut samples = Vec::with_capacity(n_days.saturating_mul(n_hours));
        for (day, &dec) in declinations.iter().enumerate() {
            for (hour, &hra) in hour_angles.iter().enumerate() {
                let (elevation_deg, azimuth_deg) = solar_position(latitude_deg, dec, hra);
                samples.push(SunPositionSample {
                    day,
                    hour,
                    declination_deg: dec,
                    hour_angle_deg: hra,
                    elevation_deg,
                    azimuth_deg,
                    dni: None,
                });
            }
        }

        Self {
            latitude_deg,
            declinations,
            hour_angles,
            samples,
        }
    }

    /// (rows, columns).
    pub fn shape(&self) -> (usize, usize) {
        (self.declinations.len(), self.hour_angles.len())
    }

    pub fn sample(&self, day: usize, hour: usize) -> Option<&SunPositionSample> {
        let (_, n_hours) = self.shape();
        if hour >= n_hours {
            return None;
        }
        self.samples.get(day * n_hours + hour)
    }

    /// Number of samples with the sun above the horizon.
    pub fn daylight_count(&self) -> usize {
        self.samples.iter().filter(|s| s.is_daylight()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_linspace_endpoints() {
        let v = linspace(-23.45, 23.45, 5);
        assert_eq!(v.len(), 5);
        assert_relative_eq!(v[0], -23.45);
        assert_relative_eq!(v[2], 0.0, epsilon = 1e-12);
        assert_relative_eq!(v[4], 23.45);
        assert_eq!(linspace(-180.0, 180.0, 1), vec![0.0]);
        assert!(linspace(0.0, 1.0, 0).is_empty());
    }

    #[test]
    fn test_noon_equinox_elevation() {
        // At the equinox the noon sun stands at 90° minus the latitude.
        let (elev, _) = solar_position(-27.85, 0.0, 0.0);
        assert_relative_eq!(elev, 90.0 - 27.85, epsilon = 1e-9);
    }

    #[test]
    fn test_noon_azimuth_faces_equator() {
        let (_, az_south_site) = solar_position(-27.85, 0.0, 0.0);
        assert_relative_eq!(az_south_site, 0.0, epsilon = 1e-9);
        let (_, az_north_site) = solar_position(34.85, 0.0, 0.0);
        assert_relative_eq!(az_north_site, 180.0, epsilon = 1e-9);
    }

    #[test]
    fn test_morning_sun_is_in_the_east() {
        let (elev, az) = solar_position(34.85, 10.0, -45.0);
        assert!(elev > 0.0);
        assert!(az > 0.0 && az < 180.0, "azimuth {}", az);
    }

    #[test]
    fn test_midnight_is_below_horizon() {
        let (elev, _) = solar_position(-27.85, 23.45, 180.0);
        assert!(elev < 0.0);
    }

    #[test]
    fn test_grid_shape_and_indexing() {
        let grid = SunGrid::annual(-27.85, 5, 22);
        assert_eq!(grid.shape(), (5, 22));
        assert_eq!(grid.samples.len(), 110);

        let s = grid.sample(3, 7).unwrap();
        assert_eq!((s.day, s.hour), (3, 7));
        assert_eq!(s.declination_deg, grid.declinations[3]);
        assert_eq!(s.hour_angle_deg, grid.hour_angles[7]);
        assert!(grid.sample(5, 0).is_none());
        assert!(grid.sample(0, 22).is_none());
    }

    #[test]
    fn test_grid_has_night_and_day() {
        let grid = SunGrid::annual(-27.85, 5, 22);
        let day = grid.daylight_count();
        assert!(day > 0 && day < grid.samples.len());
    }
}
