pub mod config;
pub mod ctx;
pub mod ops;
pub mod sink;

use std::marker::PhantomData;

use ctx::LogCtx;

pub fn pipeline() -> LogCtx<ops::pipeline::Pipeline> { LogCtx { json: config::logs_are_json(), _marker: PhantomData } }
pub fn config() -> LogCtx<ops::config::Config> { LogCtx { json: config::logs_are_json(), _marker: PhantomData } }
pub fn log() -> LogCtx<ops::log::Log> { LogCtx { json: config::logs_are_json(), _marker: PhantomData } }
pub fn import() -> LogCtx<ops::import::Import> { LogCtx { json: config::logs_are_json(), _marker: PhantomData } }
pub fn check() -> LogCtx<ops::check::Check> { LogCtx { json: config::logs_are_json(), _marker: PhantomData } }
pub fn debug() -> LogCtx<ops::debug::Debug> { LogCtx { json: config::logs_are_json(), _marker: PhantomData } }
pub fn aggressive() -> LogCtx<ops::aggressive::Aggressive> { LogCtx { json: config::logs_are_json(), _marker: PhantomData } }
pub fn paste() -> LogCtx<ops::paste::Paste> { LogCtx { json: config::logs_are_json(), _marker: PhantomData } }
pub fn test_connection() -> LogCtx<ops::test_connection::TestConnection> { LogCtx { json: config::logs_are_json(), _marker: PhantomData } }
pub fn status() -> LogCtx<ops::status::Status> { LogCtx { json: config::logs_are_json(), _marker: PhantomData } }
pub fn schedule() -> LogCtx<ops::schedule::Schedule> { LogCtx { json: config::logs_are_json(), _marker: PhantomData } }
pub fn serve() -> LogCtx<ops::serve::Serve> { LogCtx { json: config::logs_are_json(), _marker: PhantomData } }
pub fn init() -> LogCtx<ops::init::Init> { LogCtx { json: config::logs_are_json(), _marker: PhantomData } }
