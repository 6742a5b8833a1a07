//! Terminal output.
//!
//! Commands such as `system` and `parse-config` print assignments that are
//! meant to be piped or sourced, so stdout only ever carries `KEY=VALUE`
//! lines from [`assignment`] plus the status lines of commands that produce
//! no data. Section headings, warnings and errors go to stderr.

use anstyle::{AnsiColor, Style};
use is_terminal::IsTerminal;
use std::fmt::Display;
use std::io::{self, Write};

const STATUS_WIDTH: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatusKind {
    Status,
    Success,
    Info,
    Heading,
    Warn,
    Error,
}

impl StatusKind {
    fn stream(self) -> Stream {
        match self {
            StatusKind::Heading | StatusKind::Warn | StatusKind::Error => Stream::Stderr,
            StatusKind::Status | StatusKind::Success | StatusKind::Info => Stream::Stdout,
        }
    }

    fn style(self) -> Style {
        let style = Style::new().bold();
        let color = match self {
            StatusKind::Status => AnsiColor::Cyan,
            StatusKind::Success => AnsiColor::Green,
            StatusKind::Info => AnsiColor::Blue,
            StatusKind::Heading => AnsiColor::Magenta,
            StatusKind::Warn => AnsiColor::Yellow,
            StatusKind::Error => AnsiColor::Red,
        };
        style.fg_color(Some(color.into()))
    }
}

fn supports_color(stream: Stream) -> bool {
    let is_tty = match stream {
        Stream::Stdout => io::stdout().is_terminal(),
        Stream::Stderr => io::stderr().is_terminal(),
    };
    is_tty && std::env::var_os("NO_COLOR").is_none()
}

/// Right-align `label` in the status column. Continuation lines of a
/// multi-line message are indented to the message column.
fn render_status(label: &str, message: &str, style: Option<Style>) -> String {
    let (prefix, suffix) = match style {
        Some(style) => (style.render().to_string(), style.render_reset().to_string()),
        None => (String::new(), String::new()),
    };

    let mut out = String::new();
    for (idx, line) in message.split('\n').enumerate() {
        if idx == 0 {
            out.push_str(&format!(
                "{prefix}{label:>width$}{suffix} {line}\n",
                width = STATUS_WIDTH
            ));
        } else {
            out.push_str(&format!("{:>width$} {line}\n", "", width = STATUS_WIDTH));
        }
    }
    out
}

fn write_to(stream: Stream, text: &str) {
    // A closed pipe is ignored.
    let _ = match stream {
        Stream::Stdout => io::stdout().lock().write_all(text.as_bytes()),
        Stream::Stderr => io::stderr().lock().write_all(text.as_bytes()),
    };
}

fn write_status(kind: StatusKind, label: &str, message: &str) {
    let stream = kind.stream();
    let style = supports_color(stream).then(|| kind.style());
    write_to(stream, &render_status(label, message, style));
}

pub fn status(label: &str, message: impl Display) {
    write_status(StatusKind::Status, label, &message.to_string());
}

pub fn info(message: impl Display) {
    write_status(StatusKind::Info, "Info", &message.to_string());
}

pub fn success(label: &str, message: impl Display) {
    write_status(StatusKind::Success, label, &message.to_string());
}

/// Section label for a command whose stdout is data.
pub fn heading(label: &str, message: impl Display) {
    write_status(StatusKind::Heading, label, &message.to_string());
}

pub fn warn(message: impl Display) {
    write_status(StatusKind::Warn, "Warning", &message.to_string());
}

pub fn error(message: impl Display) {
    write_status(StatusKind::Error, "Error", &message.to_string());
}

/// One `KEY=VALUE` line on stdout, unstyled.
pub fn assignment(key: &str, value: &str) {
    write_to(Stream::Stdout, &format!("{key}={value}\n"));
}
