//! Backend - Collective Communication Primitives
//!
//! Defines the backend trait the sharded layers consume, and an in-process
//! implementation whose collectives are real blocking rendezvous. Every
//! rank in a world must invoke the same operation in the same order;
//! violating that ordering blocks forever, which mirrors the deadlock
//! semantics of production collective stacks. Cancellation of an in-flight
//! collective is not supported: a participant that dies mid-collective
//! leaves the world unusable, and the host recreates it.
//!
//! @version 0.1.0
//! @author TensorMesh Development Team

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use tracing::debug;

// =============================================================================
// Reduce Operations
// =============================================================================

/// Reduction operation for collective communication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
    /// Element-wise sum across ranks.
    Sum,
    /// Element-wise minimum across ranks.
    Min,
    /// Element-wise maximum across ranks.
    Max,
}

impl ReduceOp {
    /// Applies the reduction to two f32 values.
    #[must_use]
    pub fn apply(&self, a: f32, b: f32) -> f32 {
        match self {
            ReduceOp::Sum => a + b,
            ReduceOp::Min => a.min(b),
            ReduceOp::Max => a.max(b),
        }
    }

    /// Folds `other` into `acc` element-wise.
    pub fn combine(&self, acc: &mut [f32], other: &[f32]) {
        for (a, &b) in acc.iter_mut().zip(other.iter()) {
            *a = self.apply(*a, b);
        }
    }
}

// =============================================================================
// Backend Trait
// =============================================================================

/// Trait for collective communication backends.
///
/// The sharded layers depend only on this interface; any transport
/// providing these operations over a fixed set of ranks is substitutable.
/// All operations are blocking and barrier-like: they return once every
/// rank of the world has made the matching call.
pub trait CollectiveBackend: Send + Sync {
    /// Returns the name of the backend.
    fn name(&self) -> &str;

    /// Returns the rank of this participant.
    fn rank(&self) -> usize;

    /// Returns the total number of participants.
    fn world_size(&self) -> usize;

    /// Reduces `data` element-wise across all ranks; every rank receives
    /// the reduced result in `data`.
    fn all_reduce(&self, data: &mut [f32], op: ReduceOp);

    /// Replaces `data` with the root rank's buffer on every rank.
    fn broadcast(&self, data: &mut [f32], root: usize);

    /// Concatenates every rank's `send` buffer in rank order into `recv`.
    ///
    /// `recv` must hold `world_size * send.len()` elements.
    fn all_gather(&self, send: &[f32], recv: &mut [f32]);

    /// Blocks until every rank reaches the barrier.
    fn barrier(&self);
}

// =============================================================================
// Thread Backend
// =============================================================================

/// Per-world shared rendezvous state.
///
/// A collective round is open while `arrived < world_size` and closes when
/// the last rank computes the result; the round's state is recycled once
/// every rank has read it. The generation counter lets a rank distinguish
/// its own round from the next one.
struct WorldState {
    slots: Vec<Option<Vec<f32>>>,
    result: Option<Vec<f32>>,
    arrived: usize,
    departed: usize,
    generation: u64,
}

/// An in-process backend for tests and single-host worlds.
///
/// `create_world(n)` returns one handle per rank; each handle is moved to
/// its own thread, and every collective blocks until all `n` threads make
/// the matching call.
pub struct ThreadBackend {
    rank: usize,
    world_size: usize,
    shared: Arc<(Mutex<WorldState>, Condvar)>,
}

impl ThreadBackend {
    /// Creates a world of `world_size` connected backends, one per rank.
    #[must_use]
    pub fn create_world(world_size: usize) -> Vec<Self> {
        debug!(world_size, "creating thread-backend world");
        let shared = Arc::new((
            Mutex::new(WorldState {
                slots: vec![None; world_size],
                result: None,
                arrived: 0,
                departed: 0,
                generation: 0,
            }),
            Condvar::new(),
        ));

        (0..world_size)
            .map(|rank| ThreadBackend {
                rank,
                world_size,
                shared: Arc::clone(&shared),
            })
            .collect()
    }

    /// Creates a single-rank world (rank 0, world size 1).
    #[must_use]
    pub fn single() -> Self {
        ThreadBackend::create_world(1)
            .pop()
            .expect("create_world(1) yields one backend")
    }

    /// Runs one collective round: deposit a contribution, block until all
    /// ranks have arrived, and return the shared result.
    ///
    /// `complete` runs exactly once per round, on the last arriving rank.
    fn rendezvous<F>(&self, contribution: Vec<f32>, complete: F) -> Vec<f32>
    where
        F: FnOnce(&mut [Option<Vec<f32>>]) -> Vec<f32>,
    {
        let (lock, cv) = &*self.shared;
        let mut state = lock.lock();

        // A previous round may still be draining; join only a fresh one.
        while state.result.is_some() {
            cv.wait(&mut state);
        }

        let generation = state.generation;
        state.slots[self.rank] = Some(contribution);
        state.arrived += 1;

        if state.arrived == self.world_size {
            let result = complete(&mut state.slots);
            state.result = Some(result);
            cv.notify_all();
        } else {
            while !(state.generation == generation && state.result.is_some()) {
                cv.wait(&mut state);
            }
        }

        let out = state
            .result
            .clone()
            .expect("collective result set by the completing rank");

        state.departed += 1;
        if state.departed == self.world_size {
            for slot in state.slots.iter_mut() {
                *slot = None;
            }
            state.result = None;
            state.arrived = 0;
            state.departed = 0;
            state.generation = state.generation.wrapping_add(1);
            cv.notify_all();
        }

        out
    }
}

impl CollectiveBackend for ThreadBackend {
    fn name(&self) -> &str {
        "thread"
    }

    fn rank(&self) -> usize {
        self.rank
    }

    fn world_size(&self) -> usize {
        self.world_size
    }

    fn all_reduce(&self, data: &mut [f32], op: ReduceOp) {
        let result = self.rendezvous(data.to_vec(), |slots| {
            let mut acc = slots[0].take().unwrap_or_default();
            for slot in slots.iter_mut().skip(1) {
                if let Some(contribution) = slot.take() {
                    op.combine(&mut acc, &contribution);
                }
            }
            acc
        });
        data.copy_from_slice(&result);
    }

    fn broadcast(&self, data: &mut [f32], root: usize) {
        let result = self.rendezvous(data.to_vec(), |slots| {
            slots.get_mut(root).and_then(Option::take).unwrap_or_default()
        });
        data.copy_from_slice(&result);
    }

    fn all_gather(&self, send: &[f32], recv: &mut [f32]) {
        let result = self.rendezvous(send.to_vec(), |slots| {
            let mut gathered = Vec::new();
            for slot in slots.iter_mut() {
                if let Some(contribution) = slot.take() {
                    gathered.extend_from_slice(&contribution);
                }
            }
            gathered
        });
        recv.copy_from_slice(&result);
    }

    fn barrier(&self) {
        self.rendezvous(Vec::new(), |_| Vec::new());
    }
}

// =============================================================================
// Tests
// =============================================================================
