use std::path::PathBuf;

/// Failure category. Callers branch on this instead of matching message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Fetch,
    Parse,
    Pattern,
    Input,
    Io,
}

impl ErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Parse => "parse",
            Self::Pattern => "pattern",
            Self::Input => "input",
            Self::Io => "io",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every error nucsearch can produce. Displayed as user-facing messages.
#[derive(Debug)]
pub enum NucError {
    /// The retrieval service answered with a non-success status.
    Fetch {
        status: u16,
    },
    /// The request never produced a status (DNS, connect, timeout, body read).
    Transport {
        url: String,
        reason: String,
    },
    /// Malformed document, or a well-formed one without a sequence.
    Parse {
        reason: String,
    },
    Pattern {
        pattern: String,
        reason: String,
    },
    InvalidIdentifier {
        id: String,
    },
    Cache {
        path: PathBuf,
        source: std::io::Error,
    },
    Config {
        path: PathBuf,
        reason: String,
    },
}

impl std::fmt::Display for NucError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fetch { status } => {
                write!(f, "Failed to fetch data. Status code: {status}")
            }
            Self::Transport { url, reason } => {
                write!(f, "Failed to fetch data from {url}: {reason}")
            }
            Self::Parse { reason } => {
                write!(f, "Failed to parse the XML response: {reason}")
            }
            Self::Pattern { pattern, reason } => {
                write!(f, "invalid pattern \"{pattern}\": {reason}")
            }
            Self::InvalidIdentifier { id } => {
                write!(
                    f,
                    "invalid nucleotide id \"{id}\": expected a non-empty name without path separators"
                )
            }
            Self::Cache { path, source } => {
                write!(f, "{}: {source}", path.display())
            }
            Self::Config { path, reason } => {
                write!(f, "config error in {}: {reason}", path.display())
            }
        }
    }
}

impl std::error::Error for NucError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Cache { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl NucError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Fetch { .. } | Self::Transport { .. } => ErrorKind::Fetch,
            Self::Parse { .. } => ErrorKind::Parse,
            Self::Pattern { .. } => ErrorKind::Pattern,
            Self::InvalidIdentifier { .. } | Self::Config { .. } => ErrorKind::Input,
            Self::Cache { .. } => ErrorKind::Io,
        }
    }

    /// Process exit code for the command-line surface.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::Fetch | ErrorKind::Io => 2,
            ErrorKind::Parse | ErrorKind::Pattern | ErrorKind::Input => 3,
        }
    }
}
