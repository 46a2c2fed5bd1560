//! Letter-by-letter text reveal.
//!
//! At most one reveal runs per [`Typewriter`]: starting a new one cancels and
//! joins the previous thread first.

use std::io::{self, Write};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::trace;

const RUNNING: u8 = 0;
const CANCEL: u8 = 1;

struct Reveal {
    control: Arc<AtomicU8>,
    thread: JoinHandle<io::Result<()>>,
}

impl Reveal {
    fn signal(&self, value: u8) {
        self.control.store(value, Ordering::Release);
        self.thread.thread().unpark();
    }

    fn join(self) -> io::Result<()> {
        self.thread
            .join()
            .map_err(|_| io::Error::other("reveal thread panicked"))?
    }
}

pub struct Typewriter<W: Write + Send + 'static> {
    sink: Arc<Mutex<W>>,
    delay: Duration,
    active: Option<Reveal>,
}

impl<W: Write + Send + 'static> Typewriter<W> {
    /// A zero `delay` writes text in one go on the calling thread.
    pub fn new(sink: Arc<Mutex<W>>, delay: Duration) -> Self {
        Self {
            sink,
            delay,
            active: None,
        }
    }

    /// Begin revealing `text` followed by a newline.
    pub fn start(&mut self, text: impl Into<String>) -> io::Result<()> {
        self.cancel()?;
        let text = text.into();

        if self.delay.is_zero() {
            return write_all(&self.sink, &text);
        }

        let control = Arc::new(AtomicU8::new(RUNNING));
        let sink = Arc::clone(&self.sink);
        let delay = self.delay;
        let thread_control = Arc::clone(&control);
        trace!("Scheduling reveal of {} chars at {delay:?}/char", text.len());

        let thread = thread::Builder::new()
            .name("reveal".into())
            .spawn(move || run_reveal(&sink, &text, delay, &thread_control))?;

        self.active = Some(Reveal { control, thread });
        Ok(())
    }

    /// Stop the running reveal, dropping the unwritten rest.
    pub fn cancel(&mut self) -> io::Result<()> {
        match self.active.take() {
            Some(reveal) => {
                trace!("Cancelling in-flight reveal");
                reveal.signal(CANCEL);
                reveal.join()
            }
            None => Ok(()),
        }
    }

    /// Block until the running reveal has written everything.
    pub fn wait(&mut self) -> io::Result<()> {
        match self.active.take() {
            Some(reveal) => reveal.join(),
            None => Ok(()),
        }
    }
}

impl<W: Write + Send + 'static> Drop for Typewriter<W> {
    fn drop(&mut self) {
        let _ = self.cancel();
    }
}

fn write_all<W: Write>(sink: &Mutex<W>, text: &str) -> io::Result<()> {
    let mut out = sink.lock().map_err(|_| io::Error::other("output lock poisoned"))?;
    writeln!(out, "{text}")?;
    out.flush()
}

fn run_reveal<W: Write>(
    sink: &Mutex<W>,
    text: &str,
    delay: Duration,
    control: &AtomicU8,
) -> io::Result<()> {
    for ch in text.chars() {
        if control.load(Ordering::Acquire) == CANCEL {
            return Ok(());
        }
        {
            let mut out = sink.lock().map_err(|_| io::Error::other("output lock poisoned"))?;
            write!(out, "{ch}")?;
            out.flush()?;
        }
        // Woken early by cancel.
        thread::park_timeout(delay);
    }
    if control.load(Ordering::Acquire) == CANCEL {
        return Ok(());
    }
    write_all(sink, "")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sink() -> Arc<Mutex<Vec<u8>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn contents(sink: &Arc<Mutex<Vec<u8>>>) -> String {
        String::from_utf8(sink.lock().unwrap().clone()).unwrap()
    }

    #[test]
    fn test_zero_delay_is_synchronous() {
        let out = sink();
        let mut tw = Typewriter::new(Arc::clone(&out), Duration::ZERO);
        tw.start("Hello").unwrap();
        assert_eq!(contents(&out), "Hello\n");
    }

    #[test]
    fn test_wait_writes_everything() {
        let out = sink();
        let mut tw = Typewriter::new(Arc::clone(&out), Duration::from_millis(1));
        tw.start("abc déf").unwrap();
        tw.wait().unwrap();
        assert_eq!(contents(&out), "abc déf\n");
    }

    #[test]
    fn test_cancel_drops_rest() {
        let out = sink();
        let mut tw = Typewriter::new(Arc::clone(&out), Duration::from_secs(5));
        tw.start("a long passage of text").unwrap();
        tw.cancel().unwrap();

        let written = contents(&out);
        assert!(!written.contains("long"), "{written:?}");
        assert!(!written.ends_with('\n'), "{written:?}");
    }

    #[test]
    fn test_new_reveal_cancels_previous() {
        let out = sink();
        let mut tw = Typewriter::new(Arc::clone(&out), Duration::from_secs(5));
        tw.start("first passage").unwrap();
        tw.delay = Duration::from_millis(1);
        tw.start("second").unwrap();
        tw.wait().unwrap();

        let written = contents(&out);
        assert!(written.ends_with("second\n"), "{written:?}");
        assert!(!written.contains("first passage"), "{written:?}");
    }

    #[test]
    fn test_cancel_without_reveal_is_noop() {
        let out = sink();
        let mut tw = Typewriter::new(Arc::clone(&out), Duration::from_millis(1));
        tw.cancel().unwrap();
        tw.wait().unwrap();
        assert_eq!(contents(&out), "");
    }
}
