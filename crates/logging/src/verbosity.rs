//! crates/logging/src/verbosity.rs
//! Verbosity levels selected with `-q` and repeated `-v`.

use std::fmt;

use tracing::level_filters::LevelFilter;

/// How much diagnostic output a binary produces.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    /// Warnings and errors.
    #[default]
    Normal,
    /// Adds informational events such as connections and committed uploads.
    Verbose,
    /// Adds protocol steps, cleanup and transfer progress.
    Debug,
    /// Everything, including each received line.
    Trace,
}

impl Verbosity {
    /// Maps a `-v` count to a level; counts above three saturate at `Trace`.
    #[must_use]
    pub const fn from_verbose_level(count: u8) -> Self {
        match count {
            0 => Self::Normal,
            1 => Self::Verbose,
            2 => Self::Debug,
            _ => Self::Trace,
        }
    }

    /// Level one step more verbose, saturating at `Trace`.
    #[must_use]
    pub const fn raised(self) -> Self {
        match self {
            Self::Quiet => Self::Normal,
            Self::Normal => Self::Verbose,
            Self::Verbose => Self::Debug,
            Self::Debug | Self::Trace => Self::Trace,
        }
    }

    /// Maximum `tracing` level that passes at this verbosity.
    #[must_use]
    pub const fn level_filter(self) -> LevelFilter {
        match self {
            Self::Quiet => LevelFilter::ERROR,
            Self::Normal => LevelFilter::WARN,
            Self::Verbose => LevelFilter::INFO,
            Self::Debug => LevelFilter::DEBUG,
            Self::Trace => LevelFilter::TRACE,
        }
    }

    /// `EnvFilter` directive equivalent to [`level_filter`](Self::level_filter).
    #[must_use]
    pub const fn directive(self) -> &'static str {
        match self {
            Self::Quiet => "error",
            Self::Normal => "warn",
            Self::Verbose => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

impl fmt::Display for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.directive())
    }
}
