//! This module turns a raw line into a typed message. Only the *GGA*
//! sentence is interpreted; everything else is passed on untouched.

use chrono::{DateTime, Utc};
use std::str::{self, FromStr};
use tracing::{debug, warn};

use crate::config::DEFAULT_SENTENCE;
use crate::coord::Position;
use crate::err::ParseError;
use crate::utc;

const UTC_FIELD: usize = 1;
const LAT_FIELD: usize = 2;
const NS_FIELD: usize = 3;
const LONG_FIELD: usize = 4;
const EW_FIELD: usize = 5;
const QUALITY_FIELD: usize = 6;
const SATELLITES_FIELD: usize = 7;
const ALTITUDE_FIELD: usize = 9;

/// A decoded line split on commas. Empty fields are kept so that indices
/// match the sentence layout.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSentence {
    line: String,
    fields: Vec<String>,
}

impl RawSentence {
    /// The line without its line ending.
    #[inline]
    pub fn line(&self) -> &str {
        &self.line
    }

    #[inline]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// The identifier in field 0, e.g. `$GPGGA`.
    #[inline]
    pub fn sentence_id(&self) -> &str {
        &self.fields[0]
    }

    pub fn field(&self, index: usize) -> Result<&str, ParseError> {
        self.fields
            .get(index)
            .map(String::as_str)
            .ok_or(ParseError::MissingField(index))
    }
}

/// Decodes a line read from the receiver.
///
/// Trailing `\r` and `\n` are stripped. Splitting always yields at least one
/// field, so `sentence_id` is always available.
pub fn parse_line(bytes: &[u8]) -> Result<RawSentence, ParseError> {
    let line = str::from_utf8(bytes)?.trim_end_matches(&['\r', '\n'][..]);
    let fields = line.split(',').map(str::to_owned).collect();

    Ok(RawSentence {
        line: line.to_owned(),
        fields,
    })
}

/// Indicator of the quality of gps data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixQuality {
    NoFix,
    Gps,
    Dgps,
    Pps,
    Rtk,
    FloatRtk,
    Estimated,
    Manual,
    Simulation,
    Other(i64),
}

impl FixQuality {
    #[inline]
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => FixQuality::NoFix,
            1 => FixQuality::Gps,
            2 => FixQuality::Dgps,
            3 => FixQuality::Pps,
            4 => FixQuality::Rtk,
            5 => FixQuality::FloatRtk,
            6 => FixQuality::Estimated,
            7 => FixQuality::Manual,
            8 => FixQuality::Simulation,
            other => FixQuality::Other(other),
        }
    }

    /// Only GPS, DGPS and estimated fixes are trusted.
    #[inline]
    pub fn is_valid(self) -> bool {
        matches!(self, FixQuality::Gps | FixQuality::Dgps | FixQuality::Estimated)
    }
}

/// A parsed GGA sentence.
#[derive(Debug, Clone, PartialEq)]
pub struct FixReport {
    raw: RawSentence,
    utc: DateTime<Utc>,
    fix_code: i64,
    satellites: u32,
    position: Option<Position>,
    altitude: Option<f64>,
}

impl FixReport {
    /// Builds the report; only a missing or non-numeric quality code fails.
    ///
    /// A receiver without satellites sends blank time and satellite fields,
    /// in which case `now` and zero satellites are used instead.
    pub fn from_raw(raw: RawSentence, now: DateTime<Utc>) -> Result<Self, ParseError> {
        let quality_field = raw.field(QUALITY_FIELD)?;
        let fix_code = i64::from_str(quality_field.trim())
            .map_err(|_| ParseError::MalformedField(QUALITY_FIELD, quality_field.to_owned()))?;

        let (utc, satellites) = match (utc_of(&raw, now), satellites_of(&raw)) {
            (Ok(utc), Ok(satellites)) => (utc, satellites),
            (Err(e), _) | (_, Err(e)) => {
                debug!(error = %e, line = raw.line(), "no receiver time, using the clock");
                (now, 0)
            }
        };

        let (position, altitude) = if FixQuality::from_code(fix_code).is_valid() {
            (position_of(&raw), altitude_of(&raw))
        } else {
            (None, None)
        };

        Ok(FixReport {
            raw,
            utc,
            fix_code,
            satellites,
            position,
            altitude,
        })
    }

    #[inline]
    pub fn raw(&self) -> &RawSentence {
        &self.raw
    }

    #[inline]
    pub fn utc(&self) -> DateTime<Utc> {
        self.utc
    }

    #[inline]
    pub fn fix_code(&self) -> i64 {
        self.fix_code
    }

    #[inline]
    pub fn quality(&self) -> FixQuality {
        FixQuality::from_code(self.fix_code)
    }

    #[inline]
    pub fn is_valid_fix(&self) -> bool {
        self.quality().is_valid()
    }

    #[inline]
    pub fn satellites(&self) -> u32 {
        self.satellites
    }

    /// Only present for a valid fix whose position fields parsed.
    #[inline]
    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    /// Altitude above mean sea level in meters; only present for a valid fix.
    #[inline]
    pub fn altitude(&self) -> Option<f64> {
        self.altitude
    }
}

fn utc_of(raw: &RawSentence, now: DateTime<Utc>) -> Result<DateTime<Utc>, ParseError> {
    utc::resolve(raw.field(UTC_FIELD)?, now)
}

fn satellites_of(raw: &RawSentence) -> Result<u32, ParseError> {
    let field = raw.field(SATELLITES_FIELD)?;
    u32::from_str(field).map_err(|_| ParseError::MalformedField(SATELLITES_FIELD, field.to_owned()))
}

fn parse_position(raw: &RawSentence) -> Result<Position, ParseError> {
    Position::from_fields(
        raw.field(LAT_FIELD)?,
        raw.field(NS_FIELD)?,
        raw.field(LONG_FIELD)?,
        raw.field(EW_FIELD)?,
    )
}

fn position_of(raw: &RawSentence) -> Option<Position> {
    match parse_position(raw) {
        Ok(position) => Some(position),
        Err(e) => {
            warn!(error = %e, line = raw.line(), "valid fix without a usable position");
            None
        }
    }
}

fn altitude_of(raw: &RawSentence) -> Option<f64> {
    let altitude = raw.field(ALTITUDE_FIELD).and_then(|field| {
        f64::from_str(field).map_err(|_| ParseError::MalformedField(ALTITUDE_FIELD, field.to_owned()))
    });
    match altitude {
        Ok(altitude) => Some(altitude),
        Err(e) => {
            warn!(error = %e, line = raw.line(), "valid fix without a usable altitude");
            None
        }
    }
}

/// A sentence after classification.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Fix(FixReport),
    Generic(RawSentence),
}

impl Message {
    #[inline]
    pub fn raw(&self) -> &RawSentence {
        match self {
            Message::Fix(report) => report.raw(),
            Message::Generic(raw) => raw,
        }
    }

    #[inline]
    pub fn sentence_id(&self) -> &str {
        self.raw().sentence_id()
    }
}

/// `true` only for `$GPGGA`; other talkers' GGA sentences stay generic.
#[inline]
pub fn is_fix_sentence(sentence_id: &str) -> bool {
    sentence_id == DEFAULT_SENTENCE
}

/// Dispatches on the sentence identifier.
///
/// `now` anchors the date of the sentence's time of day and stands in for it
/// when the receiver sends none.
pub fn classify(raw: RawSentence, now: DateTime<Utc>) -> Result<Message, ParseError> {
    if is_fix_sentence(raw.sentence_id()) {
        Ok(Message::Fix(FixReport::from_raw(raw, now)?))
    } else {
        Ok(Message::Generic(raw))
    }
}
