//! Latitude and longitude fields of the form `DDmm.mmmm` / `DDDmm.mmmm`
//! together with their hemisphere letters.

use std::fmt;
use std::str::FromStr;

use crate::err::ParseError;

/// Index of the latitude field in a GGA sentence; used to report errors.
const LAT_FIELD: usize = 2;
const LAT_SPLIT: usize = 2;
const LONG_FIELD: usize = 4;
const LONG_SPLIT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NorthSouth {
    North,
    South,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EastWest {
    East,
    West,
}

impl NorthSouth {
    #[inline]
    pub fn letter(self) -> char {
        match self {
            NorthSouth::North => 'N',
            NorthSouth::South => 'S',
        }
    }
}

impl EastWest {
    #[inline]
    pub fn letter(self) -> char {
        match self {
            EastWest::East => 'E',
            EastWest::West => 'W',
        }
    }
}

/// A latitude/longitude pair.
///
/// Magnitudes are decimal degrees and never negative; the hemisphere alone
/// carries the sign. Plausibility (e.g. latitude <= 90) is not checked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub north_south: NorthSouth,
    pub longitude: f64,
    pub east_west: EastWest,
}

impl Position {
    /// Builds a position from the four raw fields of a sentence, or fails
    /// without producing a partial value.
    pub fn from_fields(
        lat_field: &str,
        ns_field: &str,
        long_field: &str,
        ew_field: &str,
    ) -> Result<Self, ParseError> {
        Ok(Position {
            latitude: parse_latitude(lat_field)?,
            north_south: parse_hemisphere_ns(ns_field)?,
            longitude: parse_longitude(long_field)?,
            east_west: parse_hemisphere_ew(ew_field)?,
        })
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "({}{}, {}{})",
            self.latitude,
            self.north_south.letter(),
            self.longitude,
            self.east_west.letter()
        )
    }
}

/// Parses `DDmm.mmmm` into decimal degrees.
pub fn parse_latitude(field: &str) -> Result<f64, ParseError> {
    parse_degrees(field, LAT_SPLIT, LAT_FIELD)
}

/// Parses `DDDmm.mmmm` into decimal degrees.
pub fn parse_longitude(field: &str) -> Result<f64, ParseError> {
    parse_degrees(field, LONG_SPLIT, LONG_FIELD)
}

pub fn parse_hemisphere_ns(field: &str) -> Result<NorthSouth, ParseError> {
    match first_lowercase(field) {
        Some('n') => Ok(NorthSouth::North),
        Some('s') => Ok(NorthSouth::South),
        _ => Err(ParseError::InvalidHemisphere(field.to_owned())),
    }
}

pub fn parse_hemisphere_ew(field: &str) -> Result<EastWest, ParseError> {
    match first_lowercase(field) {
        Some('e') => Ok(EastWest::East),
        Some('w') => Ok(EastWest::West),
        _ => Err(ParseError::InvalidHemisphere(field.to_owned())),
    }
}

#[inline]
fn first_lowercase(field: &str) -> Option<char> {
    field.chars().next().map(|c| c.to_ascii_lowercase())
}

/// `deg_split` is the number of characters that make up the whole degrees,
/// the rest of the field is minutes of arc.
fn parse_degrees(field: &str, deg_split: usize, index: usize) -> Result<f64, ParseError> {
    let malformed = || ParseError::MalformedField(index, field.to_owned());

    // `get` also rejects a split inside a multi-byte character
    let degrees = field.get(..deg_split).ok_or_else(malformed)?;
    let minutes = field.get(deg_split..).ok_or_else(malformed)?;

    let degrees = f64::from_str(degrees).map_err(|_| malformed())?;
    let minutes = f64::from_str(minutes).map_err(|_| malformed())?;
    if !degrees.is_finite() || !minutes.is_finite() || degrees < 0.0 || minutes < 0.0 {
        return Err(malformed());
    }

    Ok(degrees + minutes / 60.0)
}
