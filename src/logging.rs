//! Log output
//!
//! Lines are printed as `[LEVEL] message`. WARN and ERROR go to stderr,
//! everything else to stdout. `RUST_LOG` overrides the default filter.

use std::fmt;
use tracing::{Event, Level, Metadata, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::writer::{EitherWriter, MakeWriter};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

/// `[INFO] message`
pub struct BracketFormat;

impl<S, N> FormatEvent<S, N> for BracketFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(writer, "[{}] ", event.metadata().level())?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Sends WARN and ERROR events to `err` and everything else to `out`.
#[derive(Debug, Clone)]
pub struct LevelSplit<E, O> {
    err: E,
    out: O,
}

impl<E, O> LevelSplit<E, O> {
    pub fn new(err: E, out: O) -> Self {
        Self { err, out }
    }
}

impl<'a, E: MakeWriter<'a>, O: MakeWriter<'a>> MakeWriter<'a> for LevelSplit<E, O> {
    type Writer = EitherWriter<E::Writer, O::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        EitherWriter::B(self.out.make_writer())
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        // Lower levels are more severe: ERROR < WARN < INFO
        if *meta.level() <= Level::WARN {
            EitherWriter::A(self.err.make_writer_for(meta))
        } else {
            EitherWriter::B(self.out.make_writer_for(meta))
        }
    }
}

/// Default directive for the given verbosity.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose { "debug" } else { "info" }
}

/// Initialize the global subscriber. Safe to call more than once.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(LevelSplit::new(std::io::stderr, std::io::stdout))
        .event_format(BracketFormat)
        .try_init();
}
