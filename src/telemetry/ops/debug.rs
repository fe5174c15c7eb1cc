use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Debug;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Fetch, Inspect }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self { Phase::Fetch => "fetch", Phase::Inspect => "inspect" } }
    fn span(&self) -> Span { match self { Phase::Fetch => info_span!("fetch"), Phase::Inspect => info_span!("inspect") } }
}

impl OpMarker for Debug {
    const NAME: &'static str = "debug";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("debug") }
}
