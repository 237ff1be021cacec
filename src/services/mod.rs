pub mod coordinator;
pub mod dataset;
pub mod serving;
pub mod worker;
