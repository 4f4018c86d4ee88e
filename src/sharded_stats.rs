use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use thread_local::ThreadLocal;

pub trait StatsFactory: Send + Sync {
    type Stats: Stats;
    fn create(&self) -> Self::Stats;
}

pub trait Stats: Sync + Send {
    fn clear(&mut self);
    fn combine(&mut self, other: &Self);
}

/// Statistics of a phase, sharded between the runtime threads.
///
/// Workers of a phase run on many threads at once. Each thread accounts
/// its attempts in its own shard, locked by a separate parking_lot::Mutex.
/// Only the thread owning a shard and the final reader ever lock it, so
/// the locks are practically uncontended.
///
/// The reader combines the shards one at a time. Combining clears the
/// shards, so the structure can be reused by the next phase.
pub struct ShardedStats<F: StatsFactory> {
    shards: ThreadLocal<Arc<Mutex<F::Stats>>>,
    all: Mutex<Vec<Arc<Mutex<F::Stats>>>>,
    factory: Arc<F>,
}

impl<F: StatsFactory> ShardedStats<F> {
    pub fn new(factory: Arc<F>) -> Self {
        Self {
            shards: ThreadLocal::new(),
            all: Mutex::new(Vec::new()),
            factory,
        }
    }

    /// Locks the shard of the current thread, creating it on first use.
    pub fn get_shard_mut(&self) -> MutexGuard<'_, F::Stats> {
        self.shards
            .get_or(|| {
                let shard = Arc::new(Mutex::new(self.factory.create()));
                self.all.lock().push(Arc::clone(&shard));
                shard
            })
            .lock()
    }

    /// Combines statistics from all shards and clears them.
    pub fn get_combined_and_clear(&self) -> F::Stats {
        let mut combined = self.factory.create();
        for shard in self.all.lock().iter() {
            let shard = &mut shard.lock();
            combined.combine(shard);
            shard.clear();
        }
        combined
    }

    /// The number of threads which have accounted anything so far.
    pub fn shard_count(&self) -> usize {
        self.all.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CounterFactory;

    #[derive(Default)]
    struct Counter(u64);

    impl StatsFactory for CounterFactory {
        type Stats = Counter;
        fn create(&self) -> Counter {
            Counter::default()
        }
    }

    impl Stats for Counter {
        fn clear(&mut self) {
            self.0 = 0;
        }
        fn combine(&mut self, other: &Self) {
            self.0 += other.0;
        }
    }

    #[test]
    fn test_combine_across_threads() {
        let stats = Arc::new(ShardedStats::new(Arc::new(CounterFactory)));

        let threads: Vec<_> = (0..4)
            .map(|_| {
                let stats = Arc::clone(&stats);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        stats.get_shard_mut().0 += 1;
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(stats.shard_count(), 4);
        assert_eq!(stats.get_combined_and_clear().0, 4000);
        assert_eq!(stats.get_combined_and_clear().0, 0);
    }
}
