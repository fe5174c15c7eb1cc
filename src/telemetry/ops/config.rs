use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Config;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Plan, Save, List, Show }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self {
        Phase::Plan => "plan",
        Phase::Save => "save",
        Phase::List => "list",
        Phase::Show => "show",
    }}
    fn span(&self) -> Span { match self {
        Phase::Plan => info_span!("plan"),
        Phase::Save => info_span!("save"),
        Phase::List => info_span!("list"),
        Phase::Show => info_span!("show"),
    }}
}

impl OpMarker for Config {
    const NAME: &'static str = "config";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("config") }
}
