use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Check;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Fetch, Analyze }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self { Phase::Fetch => "fetch", Phase::Analyze => "analyze" } }
    fn span(&self) -> Span { match self { Phase::Fetch => info_span!("fetch"), Phase::Analyze => info_span!("analyze") } }
}

impl OpMarker for Check {
    const NAME: &'static str = "check";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("check") }
}
