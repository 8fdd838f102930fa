//! Geohash privacy encoding
//!
//! Raw coordinates are reduced to a geohash cell of configurable precision
//! before they leave the owner's update path. Two points in the same cell are
//! within that cell's error bounds of each other; points in neighbouring
//! cells may still be physically close near a cell boundary.

use geo::{coord, HaversineDistance, Point, Rect};
use thiserror::Error;

/// Default precision: 5 characters is a cell of roughly 4.9 km x 4.9 km
pub const DEFAULT_PRECISION: usize = 5;

/// Longest supported hash
pub const MAX_PRECISION: usize = 12;

const BASE32: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

#[derive(Debug, Error, PartialEq)]
pub enum GeohashError {
    #[error("latitude {0} is outside [-90, 90]")]
    InvalidLatitude(f64),

    #[error("longitude {0} is outside [-180, 180]")]
    InvalidLongitude(f64),

    #[error("precision {0} is outside 1..=12")]
    InvalidPrecision(usize),

    #[error("invalid geohash character '{0}'")]
    InvalidCharacter(char),

    #[error("empty geohash")]
    Empty,
}

/// Encode coordinates into a geohash of `precision` characters
pub fn encode(latitude: f64, longitude: f64, precision: usize) -> Result<String, GeohashError> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(GeohashError::InvalidLatitude(latitude));
    }
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(GeohashError::InvalidLongitude(longitude));
    }
    if precision == 0 || precision > MAX_PRECISION {
        return Err(GeohashError::InvalidPrecision(precision));
    }

    let mut lat_range = (-90.0_f64, 90.0_f64);
    let mut lon_range = (-180.0_f64, 180.0_f64);
    let mut hash = String::with_capacity(precision);
    let mut even_bit = true;
    let mut bit = 0;
    let mut index = 0usize;

    while hash.len() < precision {
        // Bits alternate longitude, latitude, starting with longitude
        let (range, value) = if even_bit {
            (&mut lon_range, longitude)
        } else {
            (&mut lat_range, latitude)
        };

        let mid = (range.0 + range.1) / 2.0;
        if value >= mid {
            index = index * 2 + 1;
            range.0 = mid;
        } else {
            index *= 2;
            range.1 = mid;
        }

        even_bit = !even_bit;
        bit += 1;

        if bit == 5 {
            hash.push(BASE32[index] as char);
            bit = 0;
            index = 0;
        }
    }

    Ok(hash)
}

/// Bounding box of the cell named by `hash` (x = longitude, y = latitude)
pub fn decode_bounds(hash: &str) -> Result<Rect<f64>, GeohashError> {
    if hash.is_empty() {
        return Err(GeohashError::Empty);
    }

    let mut lat_range = (-90.0_f64, 90.0_f64);
    let mut lon_range = (-180.0_f64, 180.0_f64);
    let mut even_bit = true;

    for c in hash.chars() {
        let lower = c.to_ascii_lowercase();
        let value = BASE32
            .iter()
            .position(|&b| b as char == lower)
            .ok_or(GeohashError::InvalidCharacter(c))?;

        for shift in (0..5).rev() {
            let bit_set = (value >> shift) & 1 == 1;
            let range = if even_bit { &mut lon_range } else { &mut lat_range };
            let mid = (range.0 + range.1) / 2.0;
            if bit_set {
                range.0 = mid;
            } else {
                range.1 = mid;
            }
            even_bit = !even_bit;
        }
    }

    Ok(Rect::new(
        coord! { x: lon_range.0, y: lat_range.0 },
        coord! { x: lon_range.1, y: lat_range.1 },
    ))
}

/// Center point of the cell named by `hash`
pub fn cell_center(hash: &str) -> Result<Point<f64>, GeohashError> {
    decode_bounds(hash).map(|rect| Point::from(rect.center()))
}

/// Shorten a hash to `precision` characters; never lengthens it
pub fn truncate(hash: &str, precision: usize) -> &str {
    match hash.char_indices().nth(precision) {
        Some((idx, _)) => &hash[..idx],
        None => hash,
    }
}

/// Number of leading characters two hashes share
pub fn common_prefix_len(a: &str, b: &str) -> usize {
    a.chars()
        .zip(b.chars())
        .take_while(|(x, y)| x.eq_ignore_ascii_case(y))
        .count()
}

/// Approximate distance between two cells, compared at their common precision
///
/// Cell centers are used, so the answer is never finer than the coarser of
/// the two cells.
pub fn approx_distance_km(a: &str, b: &str) -> Option<f64> {
    let precision = a.chars().count().min(b.chars().count());
    if precision == 0 {
        return None;
    }

    let center_a = cell_center(truncate(a, precision)).ok()?;
    let center_b = cell_center(truncate(b, precision)).ok()?;

    Some(center_a.haversine_distance(&center_b) / 1000.0)
}
