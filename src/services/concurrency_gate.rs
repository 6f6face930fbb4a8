//! Concurrency gate bounding how many tasks run at once.
//!
//! The limit is passed on every admission so a changed `max_parallel_tasks`
//! setting takes effect on the next tick. Lowering the limit never interrupts
//! running tasks; it only stops new admissions until enough permits drop.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

#[derive(Default)]
struct GateInner {
    holders: Mutex<HashSet<Uuid>>,
}

impl GateInner {
    fn holders(&self) -> MutexGuard<'_, HashSet<Uuid>> {
        self.holders.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Shared admission counter; clones refer to the same gate.
#[derive(Clone, Default)]
pub struct ConcurrencyGate {
    inner: Arc<GateInner>,
}

impl ConcurrencyGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit `task_id` if fewer than `limit` permits are out.
    ///
    /// Returns `None` when the gate is full or the task already holds a permit.
    pub fn try_admit(&self, task_id: Uuid, limit: usize) -> Option<Permit> {
        let mut holders = self.inner.holders();
        if holders.len() >= limit || holders.contains(&task_id) {
            return None;
        }
        holders.insert(task_id);
        Some(Permit { task_id, gate: Arc::clone(&self.inner), released: false })
    }

    /// Take a permit for a task found running at startup, ignoring the limit.
    pub fn adopt(&self, task_id: Uuid) -> Permit {
        self.inner.holders().insert(task_id);
        Permit { task_id, gate: Arc::clone(&self.inner), released: false }
    }

    pub fn in_flight(&self) -> usize {
        self.inner.holders().len()
    }

    pub fn is_full(&self, limit: usize) -> bool {
        self.in_flight() >= limit
    }

    pub fn holds(&self, task_id: Uuid) -> bool {
        self.inner.holders().contains(&task_id)
    }
}

/// A slot in the gate. Released exactly once, on drop or explicitly.
#[must_use = "dropping a permit frees the slot immediately"]
pub struct Permit {
    task_id: Uuid,
    gate: Arc<GateInner>,
    released: bool,
}

impl Permit {
    pub fn task_id(&self) -> Uuid {
        self.task_id
    }

    /// Free the slot. Returns false if this permit was already released.
    pub fn release(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.released = true;
        self.gate.holders().remove(&self.task_id);
        true
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Permit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Permit").field("task_id", &self.task_id).field("released", &self.released).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_is_enforced() {
        let gate = ConcurrencyGate::new();
        let a = gate.try_admit(Uuid::new_v4(), 2);
        let b = gate.try_admit(Uuid::new_v4(), 2);
        let c = gate.try_admit(Uuid::new_v4(), 2);

        assert!(a.is_some() && b.is_some());
        assert!(c.is_none());
        assert_eq!(gate.in_flight(), 2);

        drop(a);
        assert_eq!(gate.in_flight(), 1);
        assert!(gate.try_admit(Uuid::new_v4(), 2).is_some());
    }

    #[test]
    fn test_release_is_idempotent() {
        let gate = ConcurrencyGate::new();
        let mut permit = gate.try_admit(Uuid::new_v4(), 1).unwrap();

        assert!(permit.release());
        assert!(!permit.release());
        drop(permit);
        assert_eq!(gate.in_flight(), 0);
    }

    #[test]
    fn test_same_task_cannot_hold_two_permits() {
        let gate = ConcurrencyGate::new();
        let id = Uuid::new_v4();
        let _held = gate.try_admit(id, 5).unwrap();
        assert!(gate.try_admit(id, 5).is_none());
        assert!(gate.holds(id));
    }

    #[test]
    fn test_adopt_ignores_limit() {
        let gate = ConcurrencyGate::new();
        let _a = gate.adopt(Uuid::new_v4());
        let _b = gate.adopt(Uuid::new_v4());
        assert_eq!(gate.in_flight(), 2);
        assert!(gate.try_admit(Uuid::new_v4(), 1).is_none());
    }

    #[test]
    fn test_concurrent_admit_never_exceeds_limit() {
        let gate = ConcurrencyGate::new();
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let gate = gate.clone();
                std::thread::spawn(move || {
                    let mut peak = 0;
                    for _ in 0..200 {
                        if let Some(permit) = gate.try_admit(Uuid::new_v4(), 3) {
                            peak = peak.max(gate.in_flight());
                            drop(permit);
                        }
                    }
                    peak
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap() <= 3);
        }
        assert_eq!(gate.in_flight(), 0);
    }
}
