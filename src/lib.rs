//! # dimm
//!
//! dimm is a Rust library for ingesting large unstructured finite-volume
//! meshes stored in a hierarchical HDF5 container ("hum" files) and
//! distributing them across a parallel job, so that every worker holds a
//! contiguous slice of nodes, faces, and cells together with the
//! communication schedules needed to exchange halo data with its peers.
//!
//! ## Features
//! - Round-robin global-index maps with O(1) ownership queries
//! - Generic typed distributed directories with an unstructured all-to-all
//!   schedule-inversion protocol and plan-driven gather/migrate
//! - Mesh-aware face schedules built from raw face/cell connectivity
//! - Space-filling-curve (Morton) reordering that rewrites the container
//!   in place for locality
//! - Pluggable communication backends (serial, mailbox threads, MPI) behind
//!   a single [`comm::Communicator`] trait
//!
//! ## Usage
//! Add `dimm` as a dependency and enable features as needed:
//!
//! ```toml
//! [dependencies]
//! dimm = "0.3"
//! # Optional features:
//! # features = ["mpi-support"]
//! ```
//!
//! The `cobaltToHum`, `orderHum`, and `partMesh` binaries wrap the importer,
//! the reordering pass, and the distributed-mesh construction respectively.

pub mod comm;
pub mod dd;
pub mod error;
pub mod import;
pub mod mesh;
pub mod sfc;
pub mod store;
pub mod timing;

/// A convenient prelude importing the most-used traits and types.
pub mod prelude {
    pub use crate::comm::batch::PersistentBatch;
    #[cfg(feature = "mpi-support")]
    pub use crate::comm::MpiComm;
    pub use crate::comm::{CommTag, Communicator, NoComm, PlanCommTags, RayonComm, Wait};
    pub use crate::dd::directory::DistributedDirectory;
    pub use crate::dd::plan::CommPlan;
    pub use crate::dd::round_robin::RoundRobinMap;
    pub use crate::error::DimmError;
    pub use crate::mesh::distributed::{CellMesh, DistributedMesh};
    pub use crate::mesh::entities::{Cell, Face, FaceLr, IndexInt, Node, PatchInfo};
    pub use crate::store::hum::{HumStore, StoreMode};
    pub use crate::timing::GroupTimer;
}
