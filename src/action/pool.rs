use std::collections::VecDeque;

use rand::Rng;

use super::Rejection;
use crate::event::UserId;

/// Queue of viewers waiting for their turn, in the order they entered.
#[derive(Debug, Clone, Default)]
pub struct ViewerPool {
    max_size: Option<usize>,
    queue: VecDeque<UserId>,
}

impl ViewerPool {
    /// A negative `max_size` means the pool is unbounded.
    pub fn new(max_size: i64) -> Self {
        Self {
            max_size: usize::try_from(max_size).ok(),
            queue: VecDeque::new(),
        }
    }

    pub fn max_size(&self) -> Option<usize> {
        self.max_size
    }

    pub fn is_full(&self) -> bool {
        self.max_size.is_some_and(|max| self.queue.len() >= max)
    }

    pub fn contains(&self, viewer: UserId) -> bool {
        self.queue.contains(&viewer)
    }

    pub fn admits(&self, viewer: UserId) -> Result<(), Rejection> {
        if self.is_full() {
            return Err(Rejection::PoolFull);
        }
        if self.contains(viewer) {
            return Err(Rejection::AlreadyInPool);
        }
        Ok(())
    }

    pub fn enqueue(&mut self, viewer: UserId) -> Result<(), Rejection> {
        self.admits(viewer)?;
        self.queue.push_back(viewer);
        Ok(())
    }

    pub fn peek_oldest(&self) -> Option<UserId> {
        self.queue.front().copied()
    }

    pub fn dequeue_oldest(&mut self) -> Option<UserId> {
        self.queue.pop_front()
    }

    pub fn peek_random(&self) -> Option<UserId> {
        self.peek_random_with(&mut rand::thread_rng())
    }

    pub fn peek_random_with<R: Rng>(&self, rng: &mut R) -> Option<UserId> {
        if self.queue.is_empty() {
            return None;
        }
        let index = rng.gen_range(0..self.queue.len());
        self.queue.get(index).copied()
    }

    pub fn dequeue_random(&mut self) -> Option<UserId> {
        self.dequeue_random_with(&mut rand::thread_rng())
    }

    /// Removes a uniformly picked viewer; the others keep their relative order.
    pub fn dequeue_random_with<R: Rng>(&mut self, rng: &mut R) -> Option<UserId> {
        if self.queue.is_empty() {
            return None;
        }
        let index = rng.gen_range(0..self.queue.len());
        self.queue.remove(index)
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn viewers(&self) -> impl Iterator<Item = UserId> + '_ {
        self.queue.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    #[test]
    fn test_duplicate_is_rejected() {
        let mut pool = ViewerPool::new(-1);
        assert!(pool.enqueue(UserId(1)).is_ok());
        assert_eq!(pool.enqueue(UserId(1)), Err(Rejection::AlreadyInPool));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_capacity() {
        let mut pool = ViewerPool::new(2);
        pool.enqueue(UserId(1)).unwrap();
        pool.enqueue(UserId(2)).unwrap();
        assert!(pool.is_full());
        assert_eq!(pool.enqueue(UserId(3)), Err(Rejection::PoolFull));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_zero_capacity_admits_nobody() {
        let mut pool = ViewerPool::new(0);
        assert_eq!(pool.enqueue(UserId(1)), Err(Rejection::PoolFull));
    }

    #[test]
    fn test_fifo() {
        let mut pool = ViewerPool::new(-1);
        for id in 1..=3 {
            pool.enqueue(UserId(id)).unwrap();
        }
        assert_eq!(pool.peek_oldest(), Some(UserId(1)));
        assert_eq!(pool.dequeue_oldest(), Some(UserId(1)));
        assert_eq!(pool.dequeue_oldest(), Some(UserId(2)));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_empty_pool_signals_empty() {
        let mut pool = ViewerPool::new(-1);
        assert_eq!(pool.dequeue_random(), None);
        assert_eq!(pool.peek_random(), None);
        assert_eq!(pool.dequeue_oldest(), None);
        assert_eq!(pool.peek_oldest(), None);
    }

    #[test]
    fn test_dequeue_random_keeps_order() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut pool = ViewerPool::new(-1);
        for id in 1..=6 {
            pool.enqueue(UserId(id)).unwrap();
        }

        let picked = pool.dequeue_random_with(&mut rng).unwrap();
        assert!(!pool.contains(picked));
        assert_eq!(pool.len(), 5);

        let rest: Vec<u64> = pool.viewers().map(|v| v.0).collect();
        let mut sorted = rest.clone();
        sorted.sort();
        assert_eq!(rest, sorted);
    }

    #[test]
    fn test_peek_random_leaves_pool_untouched() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut pool = ViewerPool::new(-1);
        pool.enqueue(UserId(9)).unwrap();
        assert_eq!(pool.peek_random_with(&mut rng), Some(UserId(9)));
        assert_eq!(pool.len(), 1);
    }
}
