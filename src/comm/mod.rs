//! Communication backends and message primitives.
//!
//! The [`Communicator`] trait abstracts ranked point-to-point transfer and
//! the two collectives the directory layer needs (an all-gather of integer
//! count blocks and a max-reduction). Backends: [`NoComm`] for serial runs,
//! [`RayonComm`] for in-process multi-rank execution (one thread per rank),
//! and `MpiComm` behind the `mpi-support` feature.

pub mod batch;
mod communicator;
pub mod wire;

pub use communicator::{CommTag, Communicator, NoComm, PlanCommTags, RayonComm, Wait};

#[cfg(feature = "mpi-support")]
pub use communicator::MpiComm;
