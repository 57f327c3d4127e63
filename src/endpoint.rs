//! Ordered set of candidate backend base URLs.
//!
//! All candidates point at the same logical server reached through different network paths
//! (loopback, emulator host alias, LAN address). Which one works is discovered by trial:
//! the [Executor](crate::executor::Executor) rotates through them on connectivity failures
//! and stays on whichever one answered last.

use crate::requests::{Error, Result};

use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug)]
pub struct EndpointPool {
    endpoints: Vec<String>,
    cursor: AtomicUsize,
}

impl EndpointPool {
    /// Fails with [`Error::EmptyEndpointPool`] if `endpoints` is empty
    pub fn new<I, S>(endpoints: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let endpoints: Vec<String> = endpoints
            .into_iter()
            .map(|e| e.into().trim_end_matches('/').to_owned())
            .collect();

        if endpoints.is_empty() {
            return Err(Error::EmptyEndpointPool);
        }

        Ok(Self {
            endpoints,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Currently selected base URL
    pub fn current(&self) -> &str {
        &self.endpoints[self.index()]
    }

    /// Advances the cursor circularly and returns the newly selected base URL
    pub fn rotate(&self) -> &str {
        let len = self.endpoints.len();

        // the closure never returns None, so both arms carry the previous index
        let previous = match self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |i| Some((i + 1) % len))
        {
            Ok(i) | Err(i) => i,
        };

        let next = &self.endpoints[(previous + 1) % len];
        tracing::debug!(from = %self.endpoints[previous], to = %next, "rotated endpoint");

        next
    }

    pub fn index(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Always false, kept for symmetry with [`len`](EndpointPool::len)
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_pool_is_rejected() {
        let res = EndpointPool::new(Vec::<String>::new());

        assert!(matches!(res, Err(Error::EmptyEndpointPool)));
    }

    #[test]
    fn test_rotation_is_cyclic() {
        for size in 1..=5 {
            let urls: Vec<String> = (0..size).map(|i| format!("http://host{i}:5000/api")).collect();
            let pool = EndpointPool::new(urls).unwrap();

            let start = pool.current().to_owned();
            for _ in 0..size {
                pool.rotate();
            }

            assert_eq!(pool.current(), start, "pool of size {size} did not cycle back");
            assert_eq!(pool.index(), 0);
        }
    }

    #[test]
    fn test_rotate_returns_new_current() {
        let pool = EndpointPool::new(["http://a/api", "http://b/api/"]).unwrap();

        assert_eq!(pool.current(), "http://a/api");
        assert_eq!(pool.rotate(), "http://b/api");
        assert_eq!(pool.current(), "http://b/api");
        assert_eq!(pool.rotate(), "http://a/api");
    }

    #[test]
    fn test_single_endpoint_rotates_onto_itself() {
        let pool = EndpointPool::new(["http://only/api"]).unwrap();

        assert_eq!(pool.rotate(), "http://only/api");
        assert_eq!(pool.len(), 1);
    }
}
