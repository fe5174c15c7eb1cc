use std::sync::{Arc, Mutex, MutexGuard, OnceLock, atomic::{AtomicBool, AtomicUsize, Ordering}};

use anyhow::Result;

use crate::output::config::OutputConfig;
use crate::output::Emitter;
use crate::output::types::Envelope;

/// Destination of plan/result envelopes.
pub trait OutputSink: Send + Sync {
    fn on_plan(&self, env: &Envelope) -> Result<()>;
    fn on_result(&self, env: &Envelope) -> Result<()>;
}

#[derive(Default)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn on_plan(&self, env: &Envelope) -> Result<()> {
        if stdout_disabled() {
            return Ok(());
        }
        emit_to_stdout(env)
    }

    fn on_result(&self, env: &Envelope) -> Result<()> {
        if stdout_disabled() {
            return Ok(());
        }
        emit_to_stdout(env)
    }
}

fn emit_to_stdout(env: &Envelope) -> Result<()> {
    let emitter = Emitter::from_env(OutputConfig::from_env());
    emitter.emit(env).map_err(anyhow::Error::from)
}

type DynSink = Arc<dyn OutputSink>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn sink_slot() -> &'static Mutex<DynSink> {
    static SINK: OnceLock<Mutex<DynSink>> = OnceLock::new();
    SINK.get_or_init(|| Mutex::new(Arc::new(StdoutSink) as DynSink))
}

pub fn current_sink() -> DynSink {
    lock(sink_slot()).clone()
}

/// Restores the previous sink (and stdout) when dropped.
pub struct SinkGuard {
    previous: DynSink,
}

pub fn install_sink(new_sink: DynSink) -> SinkGuard {
    let mut guard = lock(sink_slot());
    let previous = guard.clone();
    *guard = new_sink;
    if stdout_disable_counter().fetch_add(1, Ordering::SeqCst) == 0 {
        stdout_disabled_flag().store(true, Ordering::SeqCst);
    }
    SinkGuard { previous }
}

impl Drop for SinkGuard {
    fn drop(&mut self) {
        let mut guard = lock(sink_slot());
        *guard = self.previous.clone();
        if stdout_disable_counter().fetch_sub(1, Ordering::SeqCst) == 1 {
            stdout_disabled_flag().store(false, Ordering::SeqCst);
        }
    }
}

fn stdout_disable_counter() -> &'static AtomicUsize {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    &COUNTER
}

fn stdout_disabled_flag() -> &'static AtomicBool {
    static FLAG: AtomicBool = AtomicBool::new(false);
    &FLAG
}

fn stdout_disabled() -> bool {
    stdout_disabled_flag().load(Ordering::SeqCst)
}
