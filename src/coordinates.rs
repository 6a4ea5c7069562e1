//! Where the antenna is looking on the sky
//!
//! The antenna is fixed, so its altitude/azimuth pointing is converted to equatorial
//! coordinates at the requested instant via local mean sidereal time.

use chrono::{DateTime, Utc};
use hifitime::Epoch;

use crate::{
    collaborators::{CoordinateResolver, Coordinates},
    config::ObserverParams,
    error::BoxError,
};

const J2000_JD: f64 = 2451545.0;

/// Greenwich mean sidereal time in degrees for a UTC Julian date
fn gmst_degrees(jd: f64) -> f64 {
    let d = jd - J2000_JD;
    let t = d / 36525.0;
    (280.46061837 + 360.98564736629 * d + 0.000387933 * t * t - t * t * t / 38710000.0)
        .rem_euclid(360.0)
}

fn julian_date(instant: DateTime<Utc>) -> f64 {
    let unix = instant.timestamp() as f64 + instant.timestamp_subsec_nanos() as f64 * 1e-9;
    Epoch::from_unix_seconds(unix).to_jde_utc_days()
}

/// Resolves the fixed alt/az pointing from the observer section
#[derive(Clone, Copy, Debug, Default)]
pub struct AltAzResolver;

impl CoordinateResolver for AltAzResolver {
    fn resolve(
        &self,
        instant: DateTime<Utc>,
        observer: &ObserverParams,
    ) -> Result<Coordinates, BoxError> {
        let lst = (gmst_degrees(julian_date(instant)) + observer.longitude).rem_euclid(360.0);

        let lat = observer.latitude.to_radians();
        let alt = observer.altitude.to_radians();
        let az = observer.azimuth.to_radians();

        let dec = (alt.sin() * lat.sin() + alt.cos() * lat.cos() * az.cos())
            .clamp(-1.0, 1.0)
            .asin();
        // Hour angle, positive west
        let ha = (-az.sin() * alt.cos()).atan2(alt.sin() * lat.cos() - alt.cos() * az.cos() * lat.sin());
        let ra = (lst - ha.to_degrees()).rem_euclid(360.0);

        Ok(Coordinates {
            instant,
            right_ascension: ra,
            declination: dec.to_degrees(),
            local_sidereal_time: lst,
        })
    }
}
