pub mod audit_repo;
pub mod invoice_repo;
pub mod job_repo;
pub mod ledger_repo;
pub mod order_repo;
pub mod payment_repo;
pub mod service_repo;
pub mod settings_repo;
pub mod task_repo;
