//! Fleet supervision: one runtime per configured device, shared shutdown

mod supervisor;

pub use supervisor::FleetSupervisor;
