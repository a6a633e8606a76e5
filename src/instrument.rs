//! Per-node execution counters.
//!
//! An [`Instrumentation`] block is attached to each plan state when the
//! query asks for it. The executor brackets every call into a node with
//! [`Instrumentation::start_node`] / [`Instrumentation::stop_node`] and
//! closes a loop with [`Instrumentation::end_loop`]; EXPLAIN reads the
//! aggregated values afterwards. Buffer and WAL activity is accumulated in
//! session-wide counters and attributed to a node by differencing snapshots.

use std::ops::{BitOr, BitOrAssign};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Which counters the executor should collect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InstrumentOption(pub u32);

impl InstrumentOption {
    /// Nothing.
    pub const NONE: InstrumentOption = InstrumentOption(0);
    /// Wall-clock timing.
    pub const TIMER: InstrumentOption = InstrumentOption(1 << 0);
    /// Buffer usage.
    pub const BUFFERS: InstrumentOption = InstrumentOption(1 << 1);
    /// Row counts.
    pub const ROWS: InstrumentOption = InstrumentOption(1 << 2);
    /// WAL usage.
    pub const WAL: InstrumentOption = InstrumentOption(1 << 3);
    /// Everything.
    pub const ALL: InstrumentOption = InstrumentOption(0x7FFF_FFFF);

    /// True when every bit of `other` is set.
    pub fn contains(self, other: InstrumentOption) -> bool {
        self.0 & other.0 == other.0
    }

    /// True when no counter is requested.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for InstrumentOption {
    type Output = InstrumentOption;

    fn bitor(self, rhs: InstrumentOption) -> InstrumentOption {
        InstrumentOption(self.0 | rhs.0)
    }
}

impl BitOrAssign for InstrumentOption {
    fn bitor_assign(&mut self, rhs: InstrumentOption) {
        self.0 |= rhs.0;
    }
}

/// Buffer access counters. Times are in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferUsage {
    /// Shared buffer hits.
    pub shared_blks_hit: i64,
    /// Shared blocks read.
    pub shared_blks_read: i64,
    /// Shared blocks dirtied.
    pub shared_blks_dirtied: i64,
    /// Shared blocks written.
    pub shared_blks_written: i64,
    /// Local buffer hits.
    pub local_blks_hit: i64,
    /// Local blocks read.
    pub local_blks_read: i64,
    /// Local blocks dirtied.
    pub local_blks_dirtied: i64,
    /// Local blocks written.
    pub local_blks_written: i64,
    /// Temporary blocks read.
    pub temp_blks_read: i64,
    /// Temporary blocks written.
    pub temp_blks_written: i64,
    /// Time spent reading shared blocks.
    pub shared_blk_read_time: f64,
    /// Time spent writing shared blocks.
    pub shared_blk_write_time: f64,
    /// Time spent reading local blocks.
    pub local_blk_read_time: f64,
    /// Time spent writing local blocks.
    pub local_blk_write_time: f64,
    /// Time spent reading temporary blocks.
    pub temp_blk_read_time: f64,
    /// Time spent writing temporary blocks.
    pub temp_blk_write_time: f64,
}

impl BufferUsage {
    /// Adds `other` into `self`.
    pub fn add(&mut self, other: &BufferUsage) {
        self.shared_blks_hit += other.shared_blks_hit;
        self.shared_blks_read += other.shared_blks_read;
        self.shared_blks_dirtied += other.shared_blks_dirtied;
        self.shared_blks_written += other.shared_blks_written;
        self.local_blks_hit += other.local_blks_hit;
        self.local_blks_read += other.local_blks_read;
        self.local_blks_dirtied += other.local_blks_dirtied;
        self.local_blks_written += other.local_blks_written;
        self.temp_blks_read += other.temp_blks_read;
        self.temp_blks_written += other.temp_blks_written;
        self.shared_blk_read_time += other.shared_blk_read_time;
        self.shared_blk_write_time += other.shared_blk_write_time;
        self.local_blk_read_time += other.local_blk_read_time;
        self.local_blk_write_time += other.local_blk_write_time;
        self.temp_blk_read_time += other.temp_blk_read_time;
        self.temp_blk_write_time += other.temp_blk_write_time;
    }

    /// Activity between snapshot `start` and `self`.
    pub fn since(&self, start: &BufferUsage) -> BufferUsage {
        BufferUsage {
            shared_blks_hit: self.shared_blks_hit - start.shared_blks_hit,
            shared_blks_read: self.shared_blks_read - start.shared_blks_read,
            shared_blks_dirtied: self.shared_blks_dirtied - start.shared_blks_dirtied,
            shared_blks_written: self.shared_blks_written - start.shared_blks_written,
            local_blks_hit: self.local_blks_hit - start.local_blks_hit,
            local_blks_read: self.local_blks_read - start.local_blks_read,
            local_blks_dirtied: self.local_blks_dirtied - start.local_blks_dirtied,
            local_blks_written: self.local_blks_written - start.local_blks_written,
            temp_blks_read: self.temp_blks_read - start.temp_blks_read,
            temp_blks_written: self.temp_blks_written - start.temp_blks_written,
            shared_blk_read_time: self.shared_blk_read_time - start.shared_blk_read_time,
            shared_blk_write_time: self.shared_blk_write_time - start.shared_blk_write_time,
            local_blk_read_time: self.local_blk_read_time - start.local_blk_read_time,
            local_blk_write_time: self.local_blk_write_time - start.local_blk_write_time,
            temp_blk_read_time: self.temp_blk_read_time - start.temp_blk_read_time,
            temp_blk_write_time: self.temp_blk_write_time - start.temp_blk_write_time,
        }
    }

    /// Any shared block counter is positive.
    pub fn has_shared(&self) -> bool {
        self.shared_blks_hit > 0
            || self.shared_blks_read > 0
            || self.shared_blks_dirtied > 0
            || self.shared_blks_written > 0
    }

    /// Any local block counter is positive.
    pub fn has_local(&self) -> bool {
        self.local_blks_hit > 0
            || self.local_blks_read > 0
            || self.local_blks_dirtied > 0
            || self.local_blks_written > 0
    }

    /// Any temporary block counter is positive.
    pub fn has_temp(&self) -> bool {
        self.temp_blks_read > 0 || self.temp_blks_written > 0
    }
}

/// Write-ahead log counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WalUsage {
    /// Records generated.
    pub wal_records: i64,
    /// Full page images generated.
    pub wal_fpi: i64,
    /// Bytes generated.
    pub wal_bytes: u64,
    /// Times the WAL buffers were full.
    pub wal_buffers_full: i64,
}

impl WalUsage {
    /// Adds `other` into `self`.
    pub fn add(&mut self, other: &WalUsage) {
        self.wal_records += other.wal_records;
        self.wal_fpi += other.wal_fpi;
        self.wal_bytes += other.wal_bytes;
        self.wal_buffers_full += other.wal_buffers_full;
    }

    /// Activity between snapshot `start` and `self`.
    pub fn since(&self, start: &WalUsage) -> WalUsage {
        WalUsage {
            wal_records: self.wal_records - start.wal_records,
            wal_fpi: self.wal_fpi - start.wal_fpi,
            wal_bytes: self.wal_bytes.saturating_sub(start.wal_bytes),
            wal_buffers_full: self.wal_buffers_full - start.wal_buffers_full,
        }
    }

    /// True when any counter is positive.
    pub fn is_empty(&self) -> bool {
        self.wal_records <= 0 && self.wal_fpi <= 0 && self.wal_bytes == 0 && self.wal_buffers_full <= 0
    }
}

/// JIT compilation flags recorded on a planned statement.
pub mod jit_flags {
    /// JIT was used at all.
    pub const PERFORM: i32 = 1 << 0;
    /// Expensive optimizations were enabled.
    pub const OPT3: i32 = 1 << 1;
    /// Inlining was enabled.
    pub const INLINE: i32 = 1 << 2;
    /// Expressions were compiled.
    pub const EXPR: i32 = 1 << 3;
    /// Tuple deforming was compiled.
    pub const DEFORM: i32 = 1 << 4;
}

/// JIT compilation statistics. Times are in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JitInstrumentation {
    /// Functions emitted.
    pub created_functions: u64,
    /// Time generating code, including deforming.
    pub generation_counter: f64,
    /// Time generating tuple deforming code.
    pub deform_counter: f64,
    /// Time inlining.
    pub inlining_counter: f64,
    /// Time optimizing.
    pub optimization_counter: f64,
    /// Time emitting machine code.
    pub emission_counter: f64,
}

impl JitInstrumentation {
    /// Adds `other` into `self`.
    pub fn add(&mut self, other: &JitInstrumentation) {
        self.created_functions += other.created_functions;
        self.generation_counter += other.generation_counter;
        self.deform_counter += other.deform_counter;
        self.inlining_counter += other.inlining_counter;
        self.optimization_counter += other.optimization_counter;
        self.emission_counter += other.emission_counter;
    }

    /// Sum of all phases except deforming, which generation already covers.
    pub fn total(&self) -> f64 {
        self.generation_counter
            + self.inlining_counter
            + self.optimization_counter
            + self.emission_counter
    }
}

/// Counters for one plan node. Times are in seconds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Instrumentation {
    /// Collect wall-clock time.
    pub need_timer: bool,
    /// Collect buffer usage.
    pub need_bufusage: bool,
    /// Collect WAL usage.
    pub need_walusage: bool,
    /// Node runs asynchronously; first-tuple time is measured differently.
    pub async_mode: bool,
    /// A tuple has been produced in the current loop.
    pub running: bool,
    #[serde(skip)]
    starttime: Option<Instant>,
    /// Time spent in the current loop.
    pub counter: f64,
    /// Time to the first tuple of the current loop.
    pub firsttuple: f64,
    /// Tuples produced in the current loop.
    pub tuplecount: f64,
    #[serde(skip)]
    bufusage_start: BufferUsage,
    #[serde(skip)]
    walusage_start: WalUsage,
    /// Total startup time over finished loops.
    pub startup: f64,
    /// Total time over finished loops.
    pub total: f64,
    /// Total tuples over finished loops.
    pub ntuples: f64,
    /// Secondary tuple count, meaning depends on the node.
    pub ntuples2: f64,
    /// Finished loops.
    pub nloops: f64,
    /// Rows removed by the node's own filter.
    pub nfiltered1: f64,
    /// Rows removed by a second filter, e.g. a join filter or recheck.
    pub nfiltered2: f64,
    /// Buffer usage over finished loops.
    pub bufusage: BufferUsage,
    /// WAL usage over finished loops.
    pub walusage: WalUsage,
}

impl Instrumentation {
    /// Fresh counters for the given option set.
    pub fn new(options: InstrumentOption, async_mode: bool) -> Self {
        Instrumentation {
            need_timer: options.contains(InstrumentOption::TIMER),
            need_bufusage: options.contains(InstrumentOption::BUFFERS),
            need_walusage: options.contains(InstrumentOption::WAL),
            async_mode,
            ..Instrumentation::default()
        }
    }

    /// Marks entry into the node.
    pub fn start_node(&mut self) {
        if self.need_timer {
            self.starttime = Some(Instant::now());
        }
        if self.need_bufusage {
            self.bufusage_start = session_buffer_usage();
        }
        if self.need_walusage {
            self.walusage_start = session_wal_usage();
        }
    }

    /// Marks exit from the node after it returned `n_tuples` rows.
    pub fn stop_node(&mut self, n_tuples: f64) {
        self.tuplecount += n_tuples;
        if self.need_timer {
            if let Some(start) = self.starttime.take() {
                self.counter += start.elapsed().as_secs_f64();
            }
        }
        if self.need_bufusage {
            let now = session_buffer_usage();
            self.bufusage.add(&now.since(&self.bufusage_start));
        }
        if self.need_walusage {
            let now = session_wal_usage();
            self.walusage.add(&now.since(&self.walusage_start));
        }
        if !self.running && n_tuples > 0.0 {
            self.running = true;
            self.firsttuple = self.counter;
        }
    }

    /// Records time spent in the node that a timer did not see, as for a
    /// replayed or simulated execution.
    pub fn add_elapsed(&mut self, elapsed: Duration) {
        self.counter += elapsed.as_secs_f64();
    }

    /// Folds the current loop into the totals.
    pub fn end_loop(&mut self) {
        if !self.running && self.tuplecount == 0.0 && self.counter == 0.0 {
            return;
        }
        self.startup += self.firsttuple;
        self.total += self.counter;
        self.ntuples += self.tuplecount;
        self.nloops += 1.0;
        self.running = false;
        self.starttime = None;
        self.counter = 0.0;
        self.firsttuple = 0.0;
        self.tuplecount = 0.0;
    }

    /// Merges counters collected by another process for the same node.
    pub fn aggregate(&mut self, other: &Instrumentation) {
        if !self.running {
            self.running = other.running;
            self.firsttuple = other.firsttuple;
        } else if other.running && self.firsttuple > other.firsttuple {
            self.firsttuple = other.firsttuple;
        }
        self.counter += other.counter;
        self.tuplecount += other.tuplecount;
        self.startup += other.startup;
        self.total += other.total;
        self.ntuples += other.ntuples;
        self.ntuples2 += other.ntuples2;
        self.nloops += other.nloops;
        self.nfiltered1 += other.nfiltered1;
        self.nfiltered2 += other.nfiltered2;
        if self.need_bufusage {
            self.bufusage.add(&other.bufusage);
        }
        if self.need_walusage {
            self.walusage.add(&other.walusage);
        }
    }

    /// One finished loop with the given timings, as an external executor
    /// reports it.
    pub fn record_loop(&mut self, startup: Duration, total: Duration, n_tuples: f64) {
        self.firsttuple = startup.as_secs_f64();
        self.counter = total.as_secs_f64();
        self.tuplecount = n_tuples;
        self.running = n_tuples > 0.0;
        self.end_loop();
    }
}

#[derive(Default)]
struct SessionCounters {
    buffers: BufferUsage,
    wal: WalUsage,
}

static SESSION_COUNTERS: OnceLock<Mutex<SessionCounters>> = OnceLock::new();

fn session() -> &'static Mutex<SessionCounters> {
    SESSION_COUNTERS.get_or_init(|| Mutex::new(SessionCounters::default()))
}

/// Snapshot of the session-wide buffer counters.
pub fn session_buffer_usage() -> BufferUsage {
    session().lock().buffers
}

/// Snapshot of the session-wide WAL counters.
pub fn session_wal_usage() -> WalUsage {
    session().lock().wal
}

/// Charges buffer activity to the session.
pub fn record_buffer_usage(delta: &BufferUsage) {
    session().lock().buffers.add(delta);
}

/// Charges WAL activity to the session.
pub fn record_wal_usage(delta: &WalUsage) {
    session().lock().wal.add(delta);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loops_accumulate() {
        let mut instr = Instrumentation::new(InstrumentOption::ROWS, false);
        instr.record_loop(Duration::from_millis(2), Duration::from_millis(10), 5.0);
        instr.record_loop(Duration::from_millis(4), Duration::from_millis(30), 15.0);
        assert_eq!(instr.nloops, 2.0);
        assert_eq!(instr.ntuples, 20.0);
        assert!((instr.total - 0.040).abs() < 1e-9);
        assert!((instr.startup - 0.006).abs() < 1e-9);
    }

    #[test]
    fn empty_loop_is_not_counted() {
        let mut instr = Instrumentation::new(InstrumentOption::NONE, false);
        instr.end_loop();
        assert_eq!(instr.nloops, 0.0);
    }

    #[test]
    fn first_tuple_time_is_captured_once() {
        let mut instr = Instrumentation::new(InstrumentOption::TIMER, false);
        instr.add_elapsed(Duration::from_millis(3));
        instr.stop_node(1.0);
        instr.add_elapsed(Duration::from_millis(7));
        instr.stop_node(1.0);
        instr.end_loop();
        assert!((instr.startup - 0.003).abs() < 1e-9);
        assert!((instr.total - 0.010).abs() < 1e-9);
        assert_eq!(instr.ntuples, 2.0);
    }

    #[test]
    fn buffer_usage_is_attributed_by_difference() {
        let mut instr = Instrumentation::new(InstrumentOption::BUFFERS, false);
        instr.start_node();
        record_buffer_usage(&BufferUsage {
            shared_blks_hit: 3,
            ..BufferUsage::default()
        });
        instr.stop_node(0.0);
        // other tests may charge the shared counters concurrently
        assert!(instr.bufusage.shared_blks_hit >= 3);
    }

    #[test]
    fn option_bits() {
        let opts = InstrumentOption::TIMER | InstrumentOption::ROWS;
        assert!(opts.contains(InstrumentOption::ROWS));
        assert!(!opts.contains(InstrumentOption::WAL));
        assert!(InstrumentOption::ALL.contains(opts));
    }
}
