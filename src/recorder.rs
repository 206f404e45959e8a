//! Recorders turn classified messages into log lines or CSV rows, gated by
//! an `EventTimer`.

use chrono::{DateTime, Utc};
use csv::{QuoteStyle, WriterBuilder};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use tracing::{debug, error, warn};

use crate::clock::Clock;
use crate::config::{ThrottleConfig, ThrottleRule};
use crate::coord::Position;
use crate::err::RecordError;
use crate::parser::{FixReport, Message};
use crate::timer::EventTimer;

pub const CSV_HEADER: [&str; 8] = [
    "timestamp",
    "UTC_TimeStamp",
    "latitude",
    "northsouth",
    "longitude",
    "eastwest",
    "altitude",
    "satellites_used",
];

const UTC_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f%:z";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Everything a sink needs to write one valid fix.
#[derive(Debug, Clone, Copy)]
pub struct FixEvent<'a> {
    /// When the recorder emitted the event.
    pub recorded_at: DateTime<Utc>,
    pub utc: DateTime<Utc>,
    pub position: &'a Position,
    pub altitude: f64,
    pub satellites: u32,
    pub rule: &'a ThrottleRule,
    /// The sentence as received, without line ending.
    pub original: &'a str,
}

impl<'a> FixEvent<'a> {
    /// `None` unless the report is a valid fix with position and altitude.
    pub fn from_report(
        report: &'a FixReport,
        rule: &'a ThrottleRule,
        recorded_at: DateTime<Utc>,
    ) -> Option<Self> {
        if !report.is_valid_fix() {
            return None;
        }
        Some(FixEvent {
            recorded_at,
            utc: report.utc(),
            position: report.position()?,
            altitude: report.altitude()?,
            satellites: report.satellites(),
            rule,
            original: report.raw().line(),
        })
    }

    /// `utc, lat N, long E, altitude, satellites`
    pub fn render(&self) -> String {
        format!(
            "{}, {} {}, {} {}, {:.4}, {}",
            self.utc.format(UTC_FORMAT),
            self.position.latitude,
            self.position.north_south.letter(),
            self.position.longitude,
            self.position.east_west.letter(),
            self.altitude,
            self.satellites
        )
    }
}

/// Destination of recorded fixes.
pub trait Sink {
    fn write_fix(&mut self, event: &FixEvent) -> Result<(), RecordError>;
}

/// Writes fixes as `tracing` events at the rule's level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl Sink for LogSink {
    fn write_fix(&mut self, event: &FixEvent) -> Result<(), RecordError> {
        let line = event.render();
        log_at!(event.rule.level, target: "nmea_recorder::fix", "{}", line);
        if event.rule.log_original {
            log_at!(event.rule.level, target: "nmea_recorder::fix", "{}", event.original);
        }
        Ok(())
    }
}

/// Appends one unquoted CSV row per fix and flushes after each row.
pub struct CsvSink<W: io::Write> {
    writer: csv::Writer<W>,
}

impl<W: io::Write> CsvSink<W> {
    /// Wraps `output`, writing the header row first if `write_header` is set.
    pub fn new(output: W, write_header: bool) -> Result<Self, RecordError> {
        let mut writer = WriterBuilder::new()
            .quote_style(QuoteStyle::Never)
            .has_headers(false)
            .from_writer(output);
        if write_header {
            writer.write_record(&CSV_HEADER)?;
            writer.flush()?;
        }
        Ok(CsvSink { writer })
    }

    pub fn into_inner(self) -> Result<W, RecordError> {
        self.writer
            .into_inner()
            .map_err(|e| RecordError::Io(io::Error::new(io::ErrorKind::Other, e.to_string())))
    }
}

impl CsvSink<File> {
    /// Opens `path` for appending. The header is only written to an empty
    /// file.
    pub fn append<P: AsRef<Path>>(path: P) -> Result<Self, RecordError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let empty = file.metadata()?.len() == 0;
        CsvSink::new(file, empty)
    }
}

impl<W: io::Write> Sink for CsvSink<W> {
    fn write_fix(&mut self, event: &FixEvent) -> Result<(), RecordError> {
        let position = event.position;
        self.writer.write_record(&[
            event.recorded_at.format(TIMESTAMP_FORMAT).to_string(),
            event.utc.format(UTC_FORMAT).to_string(),
            position.latitude.to_string(),
            position.north_south.letter().to_string(),
            position.longitude.to_string(),
            position.east_west.letter().to_string(),
            format!("{:.4}", event.altitude),
            event.satellites.to_string(),
        ])?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Consumes classified messages.
pub trait Recorder {
    /// Never fails; problems are logged and the message is dropped.
    fn record(&mut self, message: &Message);
}

/// Records messages to a sink, throttled per sentence type.
pub struct EventRecorder<S, C> {
    timer: EventTimer<C>,
    sink: S,
}

impl<S: Sink, C: Clock> EventRecorder<S, C> {
    pub fn new(config: ThrottleConfig, clock: C, sink: S) -> Self {
        EventRecorder {
            timer: EventTimer::new(config, clock),
            sink,
        }
    }

    #[inline]
    pub fn timer(&self) -> &EventTimer<C> {
        &self.timer
    }

    #[inline]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn record_fix(&mut self, report: &FixReport) -> Result<(), RecordError> {
        let sentence_id = report.raw().sentence_id();
        let rule = match self.timer.rule(sentence_id) {
            Some(rule) => rule,
            None => return Ok(()),
        };
        match FixEvent::from_report(report, rule, self.timer.clock().now()) {
            Some(event) => self.sink.write_fix(&event),
            None if report.is_valid_fix() => {
                warn!(
                    sentence = sentence_id,
                    line = report.raw().line(),
                    "valid fix without position or altitude, nothing recorded"
                );
                Ok(())
            }
            None => {
                debug!(
                    sentence = sentence_id,
                    code = report.fix_code(),
                    "no valid fix, nothing recorded"
                );
                Ok(())
            }
        }
    }
}

impl<S: Sink, C: Clock> Recorder for EventRecorder<S, C> {
    fn record(&mut self, message: &Message) {
        let sentence_id = message.sentence_id();
        if !self.timer.should_update(sentence_id) {
            return;
        }
        // An invalid fix still counts as an update.
        self.timer.record_update(sentence_id);

        match message {
            Message::Fix(report) => {
                if let Err(e) = self.record_fix(report) {
                    error!(error = %e, line = report.raw().line(), "failed to record fix");
                }
            }
            Message::Generic(_) => (),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::parser::{classify, parse_line};
    use chrono::{Duration, TimeZone};
    use std::sync::{Arc, Mutex};

    const FIX: &[u8] = b"$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47";
    const NO_FIX: &[u8] = b"$GPGGA,123519,,,,,0,00,,,M,,M,,*47";

    #[derive(Default)]
    struct Memory {
        lines: Vec<String>,
    }

    impl Sink for Memory {
        fn write_fix(&mut self, event: &FixEvent) -> Result<(), RecordError> {
            self.lines.push(event.render());
            Ok(())
        }
    }

    struct Broken;

    impl Sink for Broken {
        fn write_fix(&mut self, _: &FixEvent) -> Result<(), RecordError> {
            Err(RecordError::Io(io::Error::new(io::ErrorKind::Other, "disk full")))
        }
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 40, 0).unwrap()
    }

    fn message(line: &[u8]) -> Message {
        classify(parse_line(line).unwrap(), start()).unwrap()
    }

    fn recorder<S: Sink>(sink: S) -> (EventRecorder<S, ManualClock>, ManualClock) {
        let clock = ManualClock::new(start());
        let config = ThrottleConfig::new()
            .with_rule("$GPGGA", ThrottleRule::new(Duration::seconds(10)));
        (EventRecorder::new(config, clock.clone(), sink), clock)
    }

    #[test]
    fn renders_fixed_order_line() {
        let (mut rec, _) = recorder(Memory::default());
        rec.record(&message(FIX));
        let lines = &rec.sink().lines;
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("2024-03-10 12:35:19+00:00, 48.1173"));
        assert!(lines[0].ends_with(" E, 545.4000, 8"));
        assert!(lines[0].contains(" N, 11.516"));
    }

    #[test]
    fn throttles_per_interval() {
        let (mut rec, clock) = recorder(Memory::default());
        rec.record(&message(FIX));
        rec.record(&message(FIX));
        clock.advance(Duration::seconds(10));
        rec.record(&message(FIX));
        assert_eq!(rec.sink().lines.len(), 1);

        clock.advance(Duration::milliseconds(1));
        rec.record(&message(FIX));
        assert_eq!(rec.sink().lines.len(), 2);
    }

    #[test]
    fn invalid_fix_consumes_the_window() {
        let (mut rec, clock) = recorder(Memory::default());
        rec.record(&message(NO_FIX));
        assert!(rec.sink().lines.is_empty());
        assert_eq!(rec.timer().state().last_update("$GPGGA"), Some(clock.now()));

        // a valid fix right after is still throttled
        clock.advance(Duration::seconds(5));
        rec.record(&message(FIX));
        assert!(rec.sink().lines.is_empty());
    }

    #[test]
    fn throttled_messages_have_no_side_effects() {
        let (mut rec, clock) = recorder(Memory::default());
        rec.record(&message(FIX));
        let first = rec.timer().state().last_update("$GPGGA");

        clock.advance(Duration::seconds(3));
        rec.record(&message(FIX));
        assert_eq!(rec.timer().state().last_update("$GPGGA"), first);
        assert_eq!(rec.sink().lines.len(), 1);
    }

    #[test]
    fn unconfigured_and_generic_messages_are_ignored() {
        let (mut rec, _) = recorder(Memory::default());
        rec.record(&message(b"$GNGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M"));
        rec.record(&message(b"$GPRMC,123519,A"));
        assert!(rec.sink().lines.is_empty());
        assert!(rec.timer().state().is_empty());
    }

    #[test]
    fn configured_generic_messages_only_touch_the_timer() {
        let clock = ManualClock::new(start());
        let config = ThrottleConfig::new()
            .with_rule("$GPRMC", ThrottleRule::new(Duration::seconds(10)));
        let mut rec = EventRecorder::new(config, clock, Memory::default());
        rec.record(&message(b"$GPRMC,123519,A"));
        assert!(rec.sink().lines.is_empty());
        assert!(rec.timer().state().last_update("$GPRMC").is_some());
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn logged_while<F: FnOnce()>(f: F) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = captured.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn unusable_valid_fix_is_logged_apart_from_no_fix() {
        let bad_hemisphere = message(b"$GPGGA,123519,4807.038,X,01131.000,E,1,08,0.9,545.4,M");
        let (mut rec, _) = recorder(Memory::default());
        let log = logged_while(|| rec.record(&bad_hemisphere));
        assert!(rec.sink().lines.is_empty());
        assert!(log.contains("valid fix without position or altitude"));
        assert!(!log.contains("no valid fix"));

        let (mut rec, _) = recorder(Memory::default());
        let log = logged_while(|| rec.record(&message(NO_FIX)));
        assert!(log.contains("no valid fix, nothing recorded"));
        assert!(!log.contains("valid fix without position or altitude"));
    }

    #[test]
    fn sink_failures_do_not_propagate() {
        let (mut rec, clock) = recorder(Broken);
        rec.record(&message(FIX));
        assert_eq!(rec.timer().state().last_update("$GPGGA"), Some(clock.now()));
    }

    #[test]
    fn csv_rows_follow_the_header() {
        let sink = CsvSink::new(Vec::new(), true).unwrap();
        let (mut rec, _) = recorder(sink);
        rec.record(&message(FIX));
        let bytes = rec.into_sink().into_inner().unwrap();
        let text = String::from_utf8(bytes).unwrap();

        let mut rows = text.lines();
        assert_eq!(
            rows.next().unwrap(),
            "timestamp,UTC_TimeStamp,latitude,northsouth,longitude,eastwest,altitude,satellites_used"
        );
        let row: Vec<&str> = rows.next().unwrap().split(',').collect();
        assert_eq!(row.len(), 8);
        assert_eq!(row[0], "2024-03-10 12:40:00");
        assert_eq!(row[1], "2024-03-10 12:35:19+00:00");
        assert!((row[2].parse::<f64>().unwrap() - 48.1173).abs() < 1e-9);
        assert_eq!(row[3], "N");
        assert!((row[4].parse::<f64>().unwrap() - 11.516_666).abs() < 1e-5);
        assert_eq!(row[5], "E");
        assert_eq!(row[6], "545.4000");
        assert_eq!(row[7], "8");
        assert!(rows.next().is_none());
    }

    #[test]
    fn csv_without_header() {
        let mut sink = CsvSink::new(Vec::new(), false).unwrap();
        let report = match message(FIX) {
            Message::Fix(report) => report,
            _ => unreachable!(),
        };
        let rule = ThrottleRule::new(Duration::seconds(1));
        let event = FixEvent::from_report(&report, &rule, start()).unwrap();
        sink.write_fix(&event).unwrap();
        let text = String::from_utf8(sink.into_inner().unwrap()).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.starts_with("2024-03-10 12:40:00,"));
        assert!(text.ends_with("\n"));
    }

    #[test]
    fn log_sink_accepts_every_level() {
        let report = match message(FIX) {
            Message::Fix(report) => report,
            _ => unreachable!(),
        };
        for level in &[
            tracing::Level::ERROR,
            tracing::Level::WARN,
            tracing::Level::INFO,
            tracing::Level::DEBUG,
            tracing::Level::TRACE,
        ] {
            let rule = ThrottleRule::new(Duration::seconds(1))
                .level(*level)
                .log_original(true);
            let event = FixEvent::from_report(&report, &rule, start()).unwrap();
            assert!(LogSink.write_fix(&event).is_ok());
        }
    }
}
