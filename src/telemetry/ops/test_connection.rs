use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct TestConnection;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Fetch }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self { Phase::Fetch => "fetch" } }
    fn span(&self) -> Span { match self { Phase::Fetch => info_span!("fetch") } }
}

impl OpMarker for TestConnection {
    const NAME: &'static str = "test_connection";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("test_connection") }
}
