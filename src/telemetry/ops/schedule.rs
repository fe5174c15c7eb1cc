use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Schedule;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Plan, Changes, Import, Notify }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self { Phase::Plan => "plan", Phase::Changes => "changes", Phase::Import => "import", Phase::Notify => "notify" } }
    fn span(&self) -> Span { match self { Phase::Plan => info_span!("plan"), Phase::Changes => info_span!("changes"), Phase::Import => info_span!("import"), Phase::Notify => info_span!("notify") } }
}

impl OpMarker for Schedule {
    const NAME: &'static str = "schedule";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("schedule") }
}
