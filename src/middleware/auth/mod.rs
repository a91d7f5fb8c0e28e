pub mod access;
pub mod deadline;
