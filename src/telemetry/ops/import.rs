use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Import;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Load, Fetch, Import, Record }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self {
        Phase::Load => "load",
        Phase::Fetch => "fetch",
        Phase::Import => "import",
        Phase::Record => "record",
    }}
    fn span(&self) -> Span { match self {
        Phase::Load => info_span!("load"),
        Phase::Fetch => info_span!("fetch"),
        Phase::Import => info_span!("import"),
        Phase::Record => info_span!("record"),
    }}
}

impl OpMarker for Import {
    const NAME: &'static str = "import";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("import") }
}
