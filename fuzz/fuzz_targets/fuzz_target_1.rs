#![no_main]
#[macro_use] extern crate libfuzzer_sys;
extern crate chrono;
extern crate nmea_recorder;

use chrono::{TimeZone, Utc};
use nmea_recorder::{classify, parse_line, LineSource};

fuzz_target!(|data: &[u8]| {
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 30, 0).unwrap();

    for line in LineSource::new(data) {
        if let Ok(raw) = line.map_err(|_| ()).and_then(|l| parse_line(&l).map_err(|_| ())) {
            let _ = classify(raw, now);
        }
    }
});
