pub mod affinity;
