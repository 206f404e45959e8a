//! Reads NMEA 0183 sentences from a receiver, parses GGA position fixes and
//! records them to a log or a CSV file, at most once per configured interval
//! per sentence type.

#[cfg(test)]
#[macro_use]
extern crate assert_matches;
#[macro_use]
extern crate quick_error;

pub mod err;
#[macro_use]
mod macros;
pub mod clock;
pub mod config;
pub mod coord;
pub mod parser;
pub mod pipeline;
pub mod recorder;
pub mod source;
pub mod timer;
pub mod utc;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{RecorderKind, Settings, ThrottleConfig, ThrottleRule};
pub use coord::{EastWest, NorthSouth, Position};
pub use err::{ConfigError, ParseError, RecordError, SourceError};
pub use parser::{classify, parse_line, FixQuality, FixReport, Message, RawSentence};
pub use pipeline::Pipeline;
pub use recorder::{CsvSink, EventRecorder, FixEvent, LogSink, Recorder, Sink};
pub use source::LineSource;
pub use timer::{EventTimer, ThrottleState};
