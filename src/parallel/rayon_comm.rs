// rayon-based in-process communication
//
// Each rank is one thread of a dedicated pool. Ranks talk through a shared
// mailbox: a collective posts one buffer per destination, waits on the
// barrier, takes what was addressed to it, and waits again so the mailbox can
// be reused by the next collective.

use std::sync::{Arc, Barrier, Mutex, PoisonError};

use rayon::ThreadPoolBuilder;

use crate::error::{MinimError, Result};

struct Mailbox {
    barrier: Barrier,
    /// `slots[from][to]`
    slots: Mutex<Vec<Vec<Vec<f64>>>>,
}

#[derive(Clone)]
pub struct RayonComm {
    rank: usize,
    size: usize,
    mailbox: Arc<Mailbox>,
}

impl RayonComm {
    /// Run `f` once per rank on `size` concurrent threads and collect the
    /// per-rank results in rank order.
    pub fn run<F, R>(size: usize, f: F) -> Result<Vec<R>>
    where
        F: Fn(RayonComm) -> R + Sync,
        R: Send,
    {
        if size == 0 {
            return Err(MinimError::Transport("at least one rank is required".into()));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(size)
            .thread_name(|i| format!("minim-rank-{i}"))
            .build()
            .map_err(|e| MinimError::Transport(e.to_string()))?;
        let mailbox = Arc::new(Mailbox {
            barrier: Barrier::new(size),
            slots: Mutex::new(vec![Vec::new(); size]),
        });
        Ok(pool.broadcast(|ctx| {
            f(RayonComm {
                rank: ctx.index(),
                size,
                mailbox: Arc::clone(&mailbox),
            })
        }))
    }

    /// Same as [`RayonComm::run`] with one rank per logical CPU.
    pub fn run_on_all_cpus<F, R>(f: F) -> Result<Vec<R>>
    where
        F: Fn(RayonComm) -> R + Sync,
        R: Send,
    {
        Self::run(num_cpus::get(), f)
    }

    fn post(&self, outgoing: Vec<Vec<f64>>) -> Vec<Vec<f64>> {
        debug_assert_eq!(outgoing.len(), self.size);
        {
            let mut slots = self.mailbox.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots[self.rank] = outgoing;
        }
        self.mailbox.barrier.wait();
        let incoming = {
            let mut slots = self.mailbox.slots.lock().unwrap_or_else(PoisonError::into_inner);
            (0..self.size)
                .map(|from| std::mem::take(&mut slots[from][self.rank]))
                .collect()
        };
        self.mailbox.barrier.wait();
        incoming
    }
}

impl super::Comm for RayonComm {
    fn rank(&self) -> usize { self.rank }
    fn size(&self) -> usize { self.size }
    fn barrier(&self) { self.mailbox.barrier.wait(); }

    fn all_reduce(&self, x: f64) -> f64 {
        self.post(vec![vec![x]; self.size]).iter().flatten().sum()
    }

    fn broadcast(&self, data: &mut Vec<f64>, root: usize) {
        let outgoing = if self.rank == root {
            vec![data.clone(); self.size]
        } else {
            vec![Vec::new(); self.size]
        };
        let mut incoming = self.post(outgoing);
        *data = std::mem::take(&mut incoming[root]);
    }

    fn gather(&self, local: &[f64], _counts: &[usize], root: Option<usize>) -> Vec<f64> {
        let outgoing = match root {
            None => vec![local.to_vec(); self.size],
            Some(root) => {
                let mut outgoing = vec![Vec::new(); self.size];
                outgoing[root] = local.to_vec();
                outgoing
            }
        };
        let incoming = self.post(outgoing);
        match root {
            Some(root) if root != self.rank => Vec::new(),
            _ => incoming.concat(),
        }
    }

    fn scatter(&self, global: &[f64], counts: &[usize], root: usize) -> Vec<f64> {
        let outgoing = if self.rank == root {
            super::displacements(counts)
                .into_iter()
                .zip(counts)
                .map(|(start, &n)| global[start..start + n].to_vec())
                .collect()
        } else {
            vec![Vec::new(); self.size]
        };
        let mut incoming = self.post(outgoing);
        std::mem::take(&mut incoming[root])
    }

    fn exchange(&self, outgoing: &[Vec<f64>], incoming_counts: &[usize]) -> Vec<Vec<f64>> {
        let incoming = self.post(outgoing.to_vec());
        debug_assert!(incoming.iter().zip(incoming_counts).all(|(v, &n)| v.len() == n));
        incoming
    }
}
