pub mod enqueuer;
pub mod fulfillment;
pub mod ingest;
pub mod reprovision;
pub mod scheduler;
pub mod sync;
pub mod tasks;
pub mod worker;
