pub mod admin;
pub mod api_errors;
pub mod notifier;
pub mod provisioner;
pub mod stripe;
