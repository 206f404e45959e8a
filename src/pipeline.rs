//! The ingestion loop: one line at a time is read, parsed and handed to
//! every recorder before the next line is read.

use std::io::{self, Write};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::err::ParseError;
use crate::parser::{classify, parse_line, Message};
use crate::recorder::Recorder;
use crate::source::LineSource;

pub struct Pipeline<C> {
    recorders: Vec<Box<dyn Recorder>>,
    clock: C,
    echo: bool,
    poll: Duration,
}

impl<C: Clock> Pipeline<C> {
    pub fn new(recorders: Vec<Box<dyn Recorder>>, clock: C) -> Self {
        Pipeline {
            recorders,
            clock,
            echo: false,
            poll: Duration::from_millis(0),
        }
    }

    /// Print every raw line to stdout.
    pub fn echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Pause after every line.
    pub fn poll(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }

    /// Parses one line and passes the message to all recorders.
    pub fn process_line(&mut self, bytes: &[u8]) -> Result<Message, ParseError> {
        if self.echo {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            // a closed stdout is ignored
            let _ = writeln!(out, "{:?}", String::from_utf8_lossy(bytes)).and_then(|_| out.flush());
        }

        let message = classify(parse_line(bytes)?, self.clock.now())?;
        for recorder in self.recorders.iter_mut() {
            recorder.record(&message);
        }
        Ok(message)
    }

    /// Runs until `source` ends. Every failure is confined to its line.
    pub fn run<R: io::Read>(&mut self, source: LineSource<R>) {
        info!(poll = ?self.poll, recorders = self.recorders.len(), "starting ingestion loop");
        for line in source {
            match line {
                Ok(bytes) => {
                    if let Err(e) = self.process_line(&bytes) {
                        warn!(error = %e, "dropped sentence");
                    }
                }
                Err(e) => warn!(error = %e, "could not read line"),
            }
            if self.poll > Duration::from_millis(0) {
                thread::sleep(self.poll);
            }
        }
        info!("input ended");
    }
}
