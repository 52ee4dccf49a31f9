pub mod styles;

pub use styles::*;

use crate::error::DecodeError;
use std::sync::atomic::{AtomicUsize, Ordering};

static WARNINGS: AtomicUsize = AtomicUsize::new(0);

pub fn require(predicate: bool, err: DecodeError) -> Result<(), DecodeError> {
    if predicate { Ok(()) } else { Err(err) }
}

/// Report a recoverable oddity in the input. These never stop a report:
/// inspecting damaged files is the whole point of the tool.
pub fn warn(mesg: &str) {
    WARNINGS.fetch_add(1, Ordering::Relaxed);
    eprintln!("{}", mesg.warn());
}

/// Number of warnings emitted so far by this process.
pub fn warning_count() -> usize {
    WARNINGS.load(Ordering::Relaxed)
}

// Output goes to stdout or a Vec<u8> so write failures are programmer errors,
// not conditions to propagate.
macro_rules! uwriteln {
    ($out:expr) => {
        writeln!($out).unwrap()
    };
    ($out:expr, $($arg:tt)*) => {
        writeln!($out, $($arg)*).unwrap()
    };
}
pub(crate) use uwriteln;

/// Remove escape sequences from the string (e.g. for colors).
#[cfg(test)]
pub fn strip_escapes(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut escaping = false;

    // Escape sequences can be fairly gnarly, e.g. for RGB colors.
    // See https://gist.github.com/fnky/458719343aabd01cfb17a3a4f7296797
    for c in s.chars() {
        if c == '\x1b' {
            escaping = true;
        } else if escaping {
            if c == 'm' {
                escaping = false;
            }
        } else {
            result.push(c);
        }
    }
    result
}
