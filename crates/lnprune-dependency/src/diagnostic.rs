//! Non-fatal findings recorded during a build.

use std::fmt;

/// Severity level for diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum DiagnosticLevel {
    Debug,
    Info,
    Warning,
}

impl DiagnosticLevel {
    fn log_level(self) -> log::Level {
        match self {
            Self::Debug => log::Level::Debug,
            Self::Info => log::Level::Info,
            Self::Warning => log::Level::Warn,
        }
    }
}

impl fmt::Display for DiagnosticLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Debug => "Debug",
            Self::Info => "Info",
            Self::Warning => "Warning",
        })
    }
}

/// What a diagnostic is about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// A module path did not resolve in the model tree.
    UnresolvedModule,
    /// An operator fell through the classification table and was ignored.
    UnsupportedOperator,
    /// A root was abandoned because a grouped convolution depends on it.
    GroupedConvolution,
    /// A root was abandoned because its channels reach a graph output.
    GeneratesOutput,
    /// A root was abandoned because its channels are tied to a graph input.
    ConsumesInput,
    /// A tensor has neither a producer nor a parameter declaration.
    DanglingTensor,
    /// A convolution has no `.weight` input to name it by.
    MissingWeightName,
    /// Several convolutions read the same weight tensor.
    SharedWeight,
    /// A weight node in an entry has no bound module.
    UnboundWeight,
}

/// A non-fatal diagnostic message from a build.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub kind: DiagnosticKind,
    /// Weight name, module path or node label the diagnostic refers to.
    pub subject: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.level, self.subject, self.message)
    }
}

/// Records diagnostics and forwards them to the `log` facade.
#[derive(Debug, Default)]
pub(crate) struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub(crate) fn emit(
        &mut self,
        level: DiagnosticLevel,
        kind: DiagnosticKind,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) {
        let diagnostic = Diagnostic {
            level,
            kind,
            subject: subject.into(),
            message: message.into(),
        };
        log::log!(level.log_level(), "{}: {}", diagnostic.subject, diagnostic.message);
        self.entries.push(diagnostic);
    }

    pub(crate) fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}
