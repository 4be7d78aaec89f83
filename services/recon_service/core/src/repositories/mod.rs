pub mod claims;
pub mod discrepancy;
pub mod inventory;
pub mod rules;
pub mod sync_log;
