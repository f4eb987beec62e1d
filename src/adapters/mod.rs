//! Adapters Layer - Port Implementations
//!
//! Concrete implementations of the ports. The core ships only the
//! in-memory reference repository; database-backed adapters live with
//! their deployments and follow the same atomic-batch contract.

pub mod memory;

pub use memory::InMemoryRepository;
