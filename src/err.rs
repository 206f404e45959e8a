use std::{io, str};

quick_error! {
    #[derive(Debug)]
    pub enum ParseError {
        Encoding(err: str::Utf8Error) {
            from()
            description("Invalid encoding")
            display("Sentence is not valid UTF-8: {}", err)
            cause(err)
        }
        MissingField(index: usize) {
            description("Missing field")
            display("Sentence has no field at index {}", index)
        }
        MalformedField(index: usize, value: String) {
            description("Malformed field")
            display("Could not parse field {} (\"{}\")", index, value)
        }
        InvalidHemisphere(value: String) {
            description("Invalid hemisphere")
            display("Encountered invalid hemisphere \"{}\"", value)
        }
        MalformedTimestamp(value: String) {
            description("Malformed timestamp")
            display("Could not parse \"{}\" as hhmmss time of day", value)
        }
    }
}

quick_error! {
    #[derive(Debug)]
    pub enum SourceError {
        Io(err: io::Error) {
            from()
            description("I/O error")
            display("Encountered I/O error while reading a line: {}", err)
            cause(err)
        }
        LineTooLong(capacity: usize) {
            description("Line too long")
            display("Discarded a line longer than {} bytes", capacity)
        }
    }
}

quick_error! {
    #[derive(Debug)]
    pub enum RecordError {
        Io(err: io::Error) {
            from()
            description("I/O error")
            display("Could not write record: {}", err)
            cause(err)
        }
        Csv(err: csv::Error) {
            from()
            description("CSV error")
            display("Could not write CSV row: {}", err)
            cause(err)
        }
    }
}

quick_error! {
    #[derive(Debug)]
    pub enum ConfigError {
        InvalidValue(key: &'static str, value: String) {
            description("Invalid configuration value")
            display("Invalid value \"{}\" for {}", value, key)
        }
    }
}
