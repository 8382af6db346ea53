//! Publisher identity assignment
//!
//! Names are `pub<N>` with N from a counter that starts at 0 and advances by
//! one per call. The counter lives only as long as the server: a restarted
//! server starts again at `pub0`.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::protocol::PublishAssignment;

/// Allocates unique, increasing publisher names
#[derive(Debug, Default)]
pub struct PublisherAssigner {
    next: AtomicU64,
}

impl PublisherAssigner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next publisher name
    ///
    /// The name returned is also the registry key of the pipeline launched
    /// for it.
    pub fn assign(&self) -> PublishAssignment {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        PublishAssignment::from_counter(n)
    }

    /// Number of names handed out so far
    pub fn assigned(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_sequential_names() {
        let assigner = PublisherAssigner::new();

        assert_eq!(assigner.assign().name, "pub0");
        assert_eq!(assigner.assign().name, "pub1");
        assert_eq!(assigner.assign().name, "pub2");
        assert_eq!(assigner.assigned(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_names_are_unique() {
        const TASKS: u64 = 32;
        const PER_TASK: u64 = 250;
        let assigner = Arc::new(PublisherAssigner::new());

        let mut handles = Vec::new();
        for _ in 0..TASKS {
            let assigner = Arc::clone(&assigner);
            handles.push(tokio::spawn(async move {
                let mut names = Vec::with_capacity(PER_TASK as usize);
                for _ in 0..PER_TASK {
                    names.push(assigner.assign());
                    tokio::task::yield_now().await;
                }
                names
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            for assignment in handle.await.unwrap() {
                let k = assignment.index().unwrap();
                assert!(k < TASKS * PER_TASK);
                assert!(seen.insert(assignment.name), "duplicate name");
            }
        }

        assert_eq!(seen.len() as u64, TASKS * PER_TASK);
    }

    #[test]
    fn test_threads_share_counter() {
        let assigner = Arc::new(PublisherAssigner::new());

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let assigner = Arc::clone(&assigner);
                std::thread::spawn(move || (0..100).map(|_| assigner.assign()).collect::<Vec<_>>())
            })
            .collect();

        let names: HashSet<_> = threads
            .into_iter()
            .flat_map(|t| t.join().unwrap())
            .collect();

        assert_eq!(names.len(), 800);
    }
}
