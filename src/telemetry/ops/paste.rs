use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Paste;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Read, Import, Record }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self { Phase::Read => "read", Phase::Import => "import", Phase::Record => "record" } }
    fn span(&self) -> Span { match self { Phase::Read => info_span!("read"), Phase::Import => info_span!("import"), Phase::Record => info_span!("record") } }
}

impl OpMarker for Paste {
    const NAME: &'static str = "paste";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("paste") }
}
