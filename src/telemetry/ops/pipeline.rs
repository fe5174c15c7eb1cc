use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Pipeline;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Parse, Element, Write }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self { Phase::Parse => "parse", Phase::Element => "element", Phase::Write => "write" } }
    fn span(&self) -> Span { match self { Phase::Parse => info_span!("parse"), Phase::Element => info_span!("element"), Phase::Write => info_span!("write") } }
}

impl OpMarker for Pipeline {
    const NAME: &'static str = "pipeline";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("pipeline") }
}
