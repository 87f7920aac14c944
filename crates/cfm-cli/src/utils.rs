use std::{
    fmt::Display,
    io::Write,
    sync::{LazyLock, PoisonError, RwLock},
};

use nu_ansi_term::Color;
use serde::Serialize;

use crate::error::{CliResult, ErrorContext};

pub static COLOR: LazyLock<RwLock<bool>> = LazyLock::new(|| RwLock::new(true));

pub fn set_color(enabled: bool) {
    *COLOR.write().unwrap_or_else(PoisonError::into_inner) = enabled;
}

pub struct Colored<T: Display>(pub Color, pub T);

impl<T: Display> Display for Colored<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let color = *COLOR.read().unwrap_or_else(PoisonError::into_inner);
        if color {
            write!(f, "{}", self.0.prefix())?;
            self.1.fmt(f)?;
            write!(f, "{}", self.0.suffix())
        } else {
            self.1.fmt(f)
        }
    }
}

/// Writes `value` to stdout as pretty-printed JSON.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{text}").with_context(|| "writing to stdout".to_string())
}

/// Writes one line to stdout.
pub fn print_line<T: Display>(line: T) -> CliResult<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{line}").with_context(|| "writing to stdout".to_string())
}
