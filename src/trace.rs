//! Chrome trace output.
//!
//! Load the output in chrome://tracing or https://ui.perfetto.dev.  Scopes may
//! be entered from any thread; the watcher stats files from the rayon pool.

use std::cell::Cell;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Instant;

static TRACE: Mutex<Option<Trace>> = Mutex::new(None);

static NEXT_TID: AtomicUsize = AtomicUsize::new(0);
thread_local! {
    static TID: Cell<usize> = Cell::new(NEXT_TID.fetch_add(1, Ordering::Relaxed));
}

struct Event {
    name: &'static str,
    tid: usize,
    start: Instant,
    end: Instant,
}

struct Trace {
    start: Instant,
    w: BufWriter<File>,
}

impl Trace {
    fn new(path: &str) -> std::io::Result<Self> {
        let mut w = BufWriter::new(File::create(path)?);
        writeln!(w, "[")?;
        Ok(Trace {
            start: Instant::now(),
            w,
        })
    }

    fn write_event(&mut self, event: &Event) -> std::io::Result<()> {
        write!(
            self.w,
            "{{ \"pid\": 0, \"tid\": {}, \"name\": {:?}, \"ts\": {}, \"ph\": \"X\", \"dur\": {} }}",
            event.tid,
            event.name,
            event.start.duration_since(self.start).as_micros(),
            event.end.duration_since(event.start).as_micros(),
        )
    }

    fn write(&mut self, event: &Event) -> std::io::Result<()> {
        self.write_event(event)?;
        writeln!(self.w, ",")
    }

    fn close(&mut self) -> std::io::Result<()> {
        self.write_event(&Event {
            name: "main",
            tid: 0,
            start: self.start,
            end: Instant::now(),
        })?;
        writeln!(self.w, "]")?;
        self.w.flush()
    }
}

pub fn open(path: &str) -> std::io::Result<()> {
    let trace = Trace::new(path)?;
    if let Ok(mut global) = TRACE.lock() {
        *global = Some(trace);
    }
    Ok(())
}

fn enabled() -> bool {
    match TRACE.lock() {
        Ok(global) => global.is_some(),
        Err(_) => false,
    }
}

/// Run f, recording its duration under name if tracing is on.
#[inline]
pub fn scope<T>(name: &'static str, f: impl FnOnce() -> T) -> T {
    if !enabled() {
        return f();
    }
    let start = Instant::now();
    let result = f();
    let event = Event {
        name,
        tid: TID.with(|tid| tid.get()),
        start,
        end: Instant::now(),
    };
    if let Ok(mut global) = TRACE.lock() {
        if let Some(t) = global.as_mut() {
            // A trace write failure must not fail the traced work.
            let _ = t.write(&event);
        }
    }
    result
}

pub fn close() -> std::io::Result<()> {
    if let Ok(mut global) = TRACE.lock() {
        if let Some(mut t) = global.take() {
            return t.close();
        }
    }
    Ok(())
}
