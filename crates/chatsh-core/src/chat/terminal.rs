use std::io::{self, Write};

/// Where the client writes everything the user sees.
pub trait Terminal: Send + Sync {
    /// Write `text` as-is and flush.
    fn print(&self, text: &str);
    fn newline(&self);

    fn println(&self, text: &str) {
        self.print(text);
        self.newline();
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutTerminal;

impl Terminal for StdoutTerminal {
    fn print(&self, text: &str) {
        let mut out = io::stdout().lock();
        // A closed stdout leaves nothing useful to report to.
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }

    fn newline(&self) {
        let mut out = io::stdout().lock();
        let _ = out.write_all(b"\n");
        let _ = out.flush();
    }
}
