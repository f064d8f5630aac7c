//! Colors and markers for backdate's terminal output
//!
//! Color support is detected per stream by `owo-colors`, so `NO_COLOR` and
//! redirected output render plain text.

use chrono::NaiveDate;
use indicatif::ProgressStyle;
use owo_colors::{OwoColorize, Stream, Style};
use std::fmt::{self, Display};
use std::sync::OnceLock;

const ACCENT: Style = Style::new().cyan();
const GOOD: Style = Style::new().green();
const BAD: Style = Style::new().red();
const CAUTION: Style = Style::new().yellow();
const QUIET: Style = Style::new().dimmed();
const STRONG: Style = Style::new().bold();

/// A value painted with a style when its stream supports color
#[derive(Clone, Debug)]
pub struct Styled<T> {
    value: T,
    style: Style,
    stream: Stream,
}

impl<T> Styled<T> {
    const fn new(value: T, style: Style, stream: Stream) -> Self {
        Self {
            value,
            style,
            stream,
        }
    }

    /// Detect color support on stderr
    #[must_use]
    pub const fn for_stderr(mut self) -> Self {
        self.stream = Stream::Stderr;
        self
    }
}

impl<T: Display> Display for Styled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            self.value
                .if_supports_color(self.stream, |v| v.style(self.style))
        )
    }
}

/// Semantic styling for anything displayable
pub trait Stylize: Display {
    /// Branch names, regions and counts
    fn accent(&self) -> Styled<&Self> {
        Styled::new(self, ACCENT, Stream::Stdout)
    }

    /// Failure text; rendered for stderr
    fn error(&self) -> Styled<&Self> {
        Styled::new(self, BAD, Stream::Stderr)
    }

    /// Hints, weekdays and other metadata
    fn muted(&self) -> Styled<&Self> {
        Styled::new(self, QUIET, Stream::Stdout)
    }

    /// Headings
    fn emphasis(&self) -> Styled<&Self> {
        Styled::new(self, STRONG, Stream::Stdout)
    }
}

impl<T: Display + ?Sized> Stylize for T {}

/// A date leading a line of output
pub const fn date(date: NaiveDate) -> Styled<NaiveDate> {
    Styled::new(date, STRONG, Stream::Stdout)
}

/// `(n commits)` for an assignment
pub fn commit_count(n: usize) -> Styled<String> {
    let unit = if n == 1 { "commit" } else { "commits" };
    Styled::new(format!("({n} {unit})"), QUIET, Stream::Stdout)
}

/// `#n` for a pull request
pub fn pr_ref(number: u64) -> Styled<String> {
    Styled::new(format!("#{number}"), ACCENT, Stream::Stdout)
}

/// A step or result that went through
pub const fn check() -> Styled<&'static str> {
    Styled::new("✓", GOOD, Stream::Stdout)
}

/// A failed result; rendered for stderr
pub const fn cross() -> Styled<&'static str> {
    Styled::new("✗", BAD, Stream::Stderr)
}

/// The next step
pub const fn arrow() -> Styled<&'static str> {
    Styled::new("→", ACCENT, Stream::Stdout)
}

/// A date the calendar excludes
pub const fn excluded() -> Styled<&'static str> {
    Styled::new("○", QUIET, Stream::Stdout)
}

/// A result that needs a human
pub const fn attention() -> Styled<&'static str> {
    Styled::new("!", CAUTION, Stream::Stdout)
}

/// Tag for a push that overwrote the remote branch
pub const fn forced() -> Styled<&'static str> {
    Styled::new("(forced)", CAUTION, Stream::Stdout)
}

/// URL as an OSC 8 link on stdout, plain text where unsupported
pub fn link(url: &str) -> String {
    if supports_hyperlinks::on(supports_hyperlinks::Stream::Stdout) {
        terminal_link::Link::new(url, url).to_string()
    } else {
        url.to_string()
    }
}

/// Run spinner: cyan dots, branch message, elapsed time
pub fn spinner_style() -> ProgressStyle {
    static STYLE: OnceLock<ProgressStyle> = OnceLock::new();
    STYLE
        .get_or_init(|| {
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg} {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        })
        .clone()
}
