use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Aggressive;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Poll, Trigger }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self { Phase::Poll => "poll", Phase::Trigger => "trigger" } }
    fn span(&self) -> Span { match self { Phase::Poll => info_span!("poll"), Phase::Trigger => info_span!("trigger") } }
}

impl OpMarker for Aggressive {
    const NAME: &'static str = "aggressive";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("aggressive") }
}
