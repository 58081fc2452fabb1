//! Simulation kernel contract
//!
//! The kernel is game-specific code: reel evaluation, payouts, RNG. The
//! engine only calls [`SimulationKernel::simulate`] once per trial, in
//! ascending trial order within a worker, so a kernel may carry RNG state
//! from one call to the next.

use crate::book::Book;
use crate::error::KernelError;

/// Executes exactly one trial
pub trait SimulationKernel {
    /// Simulate the trial with the given global index
    fn simulate(&mut self, trial_index: u64) -> Result<Book, KernelError>;
}

impl<K: SimulationKernel + ?Sized> SimulationKernel for Box<K> {
    fn simulate(&mut self, trial_index: u64) -> Result<Book, KernelError> {
        (**self).simulate(trial_index)
    }
}

/// Creates one kernel per worker
///
/// Kernels are never shared between workers; each worker owns the kernel
/// the factory gives it for the whole partition.
pub trait KernelFactory: Sync {
    type Kernel: SimulationKernel;

    /// Build the kernel for a worker
    fn create(&self, thread_id: usize) -> Result<Self::Kernel, KernelError>;
}

impl<F, K> KernelFactory for F
where
    F: Fn(usize) -> K + Sync,
    K: SimulationKernel,
{
    type Kernel = K;

    fn create(&self, thread_id: usize) -> Result<K, KernelError> {
        Ok(self(thread_id))
    }
}

/// Kernel backed by a closure
pub struct FnKernel<F> {
    func: F,
}

impl<F> FnKernel<F>
where
    F: FnMut(u64) -> Result<Book, KernelError>,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> SimulationKernel for FnKernel<F>
where
    F: FnMut(u64) -> Result<Book, KernelError>,
{
    fn simulate(&mut self, trial_index: u64) -> Result<Book, KernelError> {
        (self.func)(trial_index)
    }
}
