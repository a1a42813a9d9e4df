//! Map-style worker pools for embarrassingly parallel QA jobs.
//!
//! Jobs (one per input file, one per flux bin) share no mutable state, so
//! the only contract a pool has to honour is `map(items, f)`: apply `f` to
//! every item and hand back the results in input order. [`QaPool`] picks
//! the serial or rayon-backed implementation from a [`PoolConfig`].

use rayon::prelude::*;

use crate::config::PoolConfig;
use crate::error::{QaError, Result};

/// Apply a pure function to every item, returning results in input order.
pub trait MapPool {
    fn map<T, R, F>(&self, items: Vec<T>, f: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Send + Sync;
}

/// Runs every job on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialPool;

impl MapPool for SerialPool {
    fn map<T, R, F>(&self, items: Vec<T>, f: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Send + Sync,
    {
        items.into_iter().map(f).collect()
    }
}

/// Dedicated fixed-size rayon thread pool.
#[derive(Debug)]
pub struct RayonPool {
    pool: rayon::ThreadPool,
}

impl RayonPool {
    /// Build a pool with `threads` workers, or rayon's default count.
    pub fn new(threads: Option<usize>) -> Result<Self> {
        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(n) = threads {
            builder = builder.num_threads(n);
        }
        let pool = builder.build().map_err(|e| QaError::Pool(e.to_string()))?;
        Ok(Self { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl MapPool for RayonPool {
    fn map<T, R, F>(&self, items: Vec<T>, f: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Send + Sync,
    {
        // Indexed parallel iterators collect in input order.
        self.pool.install(|| items.into_par_iter().map(f).collect())
    }
}

/// Pool chosen at start-up from configuration.
#[derive(Debug)]
pub enum QaPool {
    Serial(SerialPool),
    Parallel(RayonPool),
}

impl QaPool {
    pub fn from_config(config: &PoolConfig) -> Result<Self> {
        if config.serial {
            log::debug!("Using serial pool");
            return Ok(QaPool::Serial(SerialPool));
        }
        let pool = RayonPool::new(config.threads)?;
        log::debug!("Using rayon pool with {} threads", pool.threads());
        Ok(QaPool::Parallel(pool))
    }
}

impl MapPool for QaPool {
    fn map<T, R, F>(&self, items: Vec<T>, f: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Send + Sync,
    {
        match self {
            QaPool::Serial(pool) => pool.map(items, f),
            QaPool::Parallel(pool) => pool.map(items, f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_all<P: MapPool>(pool: &P) -> Vec<u64> {
        pool.map((0..100u64).collect(), |x| x * x)
    }

    #[test]
    fn test_serial_and_parallel_agree_in_order() {
        let expected: Vec<u64> = (0..100u64).map(|x| x * x).collect();
        assert_eq!(square_all(&SerialPool), expected);
        assert_eq!(square_all(&RayonPool::new(Some(4)).unwrap()), expected);
    }

    #[test]
    fn test_from_config_selects_implementation() {
        let serial = QaPool::from_config(&PoolConfig {
            serial: true,
            threads: None,
        })
        .unwrap();
        assert!(matches!(serial, QaPool::Serial(_)));

        let parallel = QaPool::from_config(&PoolConfig {
            serial: false,
            threads: Some(2),
        })
        .unwrap();
        match &parallel {
            QaPool::Parallel(pool) => assert_eq!(pool.threads(), 2),
            QaPool::Serial(_) => panic!("expected a parallel pool"),
        }
        assert_eq!(square_all(&parallel)[9], 81);
    }

    #[test]
    fn test_empty_input() {
        let out: Vec<u8> = SerialPool.map(Vec::<u8>::new(), |x| x);
        assert!(out.is_empty());
    }
}
