use anyhow::Result;
use console::{style, Term};
use std::sync::atomic::{AtomicBool, Ordering};

const PREFIX_LEN: usize = 10;

pub fn gen_prefix(prefix: &str) -> String {
    let pad = PREFIX_LEN.saturating_sub(console::measure_text_width(prefix));
    format!("{}{}", prefix, " ".repeat(pad.max(1)))
}

/// Styled message writer for everything that is not program output.
/// Program output (dependency trees, search hits) goes to stdout via
/// plain `println!`; this writes to stderr.
pub struct Writer {
    term: Term,
    verbose: AtomicBool,
}

impl Writer {
    pub fn new() -> Self {
        Writer {
            term: Term::stderr(),
            verbose: AtomicBool::new(false),
        }
    }

    pub fn set_verbose(&self, verbose: bool) {
        self.verbose.store(verbose, Ordering::Relaxed);
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose.load(Ordering::Relaxed)
    }

    pub fn get_max_len(&self) -> usize {
        self.term.size_checked().map(|(_, w)| w as usize).unwrap_or(80)
    }

    pub fn writeln(&self, prefix: &str, msg: &str) -> Result<()> {
        let prefix = gen_prefix(prefix);
        let indent = " ".repeat(PREFIX_LEN);
        let mut first = true;
        for line in msg.lines() {
            if first {
                self.term.write_line(&format!("{prefix}{line}"))?;
                first = false;
            } else {
                self.term.write_line(&format!("{indent}{line}"))?;
            }
        }
        if first {
            // Empty message still prints the prefix line
            self.term.write_line(prefix.trim_end())?;
        }
        Ok(())
    }
}

impl Default for Writer {
    fn default() -> Self {
        Writer::new()
    }
}

pub fn style_prefix_info() -> String {
    style("INFO").blue().to_string()
}

pub fn style_prefix_warn() -> String {
    style("WARN").yellow().bold().to_string()
}

pub fn style_prefix_error() -> String {
    style("ERROR").red().bold().to_string()
}

pub fn style_prefix_due_to() -> String {
    style("DUE TO").yellow().bold().to_string()
}

pub fn style_prefix_success() -> String {
    style("SUCCESS").green().bold().to_string()
}

pub fn style_prefix_debug() -> String {
    style("DEBUG").dim().to_string()
}

#[macro_export]
macro_rules! msg {
    ($($arg:tt)+) => {
        $crate::WRITER.writeln("", &format!($($arg)+)).ok();
    };
}

#[macro_export]
macro_rules! info {
    ($($arg:tt)+) => {
        $crate::WRITER.writeln(&$crate::cli::style_prefix_info(), &format!($($arg)+)).ok();
    };
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)+) => {
        $crate::WRITER.writeln(&$crate::cli::style_prefix_warn(), &format!($($arg)+)).ok();
    };
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)+) => {
        $crate::WRITER.writeln(&$crate::cli::style_prefix_error(), &format!($($arg)+)).ok();
    };
}

#[macro_export]
macro_rules! due_to {
    ($($arg:tt)+) => {
        $crate::WRITER.writeln(&$crate::cli::style_prefix_due_to(), &format!($($arg)+)).ok();
    };
}

#[macro_export]
macro_rules! success {
    ($($arg:tt)+) => {
        $crate::WRITER.writeln(&$crate::cli::style_prefix_success(), &format!($($arg)+)).ok();
    };
}

#[macro_export]
macro_rules! debug {
    ($($arg:tt)+) => {
        if $crate::WRITER.is_verbose() {
            $crate::WRITER.writeln(&$crate::cli::style_prefix_debug(), &format!($($arg)+)).ok();
        }
    };
}
