mod densemap;
pub mod fs;
pub mod graph;
pub mod load;
pub mod marker;
pub mod regen;
pub mod run;
mod signal;
pub mod stale;
pub mod trace;
pub mod watch;

#[cfg(not(any(windows, target_arch = "wasm32")))]
use jemallocator::Jemalloc;

#[cfg(not(any(windows, target_arch = "wasm32")))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;
