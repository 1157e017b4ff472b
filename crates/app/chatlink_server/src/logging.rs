//! Log output that never carries registered secrets.

use std::io::{self, Write};

use chatlink_core::redact::Redactor;
use tracing_subscriber::fmt::MakeWriter;

/// Hands out one [`RedactingWriter`] per formatted event.
pub struct RedactingMakeWriter<F> {
    redactor: Redactor,
    sink: F,
}

impl<F> RedactingMakeWriter<F> {
    pub fn new(redactor: Redactor, sink: F) -> Self {
        Self { redactor, sink }
    }
}

impl<'a, F, W> MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write + 'static,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter {
            redactor: self.redactor.clone(),
            buf: Vec::new(),
            inner: (self.sink)(),
        }
    }
}

/// Buffers one event and writes it scrubbed when dropped.
pub struct RedactingWriter<W: Write> {
    redactor: Redactor,
    buf: Vec<u8>,
    inner: W,
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<W: Write> Drop for RedactingWriter<W> {
    fn drop(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        let line = String::from_utf8_lossy(&self.buf);
        let scrubbed = self.redactor.scrub(&line);
        let _ = self.inner.write_all(scrubbed.as_bytes());
        let _ = self.inner.flush();
    }
}

/// Install the global subscriber: env filter, stderr, secrets scrubbed.
pub fn init(redactor: Redactor) {
    tracing_subscriber::fmt()
        .with_writer(RedactingMakeWriter::new(redactor, io::stderr))
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,chatlink_api=debug,chatlink_core=debug")),
        )
        .init();
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(bytes);
            Ok(bytes.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn secrets_are_scrubbed_per_event() {
        let redactor = Redactor::new();
        redactor.add_secret("hunter2");
        let captured = Captured::default();
        let sink = captured.clone();
        let make = RedactingMakeWriter::new(redactor, move || sink.clone());

        {
            let mut w = make.make_writer();
            w.write_all(b"login with hunter2 ").unwrap();
            w.write_all(b"X-Auth-Token: abc123 done\n").unwrap();
        }

        let out = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(!out.contains("hunter2"));
        assert!(!out.contains("abc123"));
        assert!(out.ends_with('\n'));
    }
}
