pub mod billing;
pub mod claim;
pub mod discrepancy;
pub mod inventory;
pub mod rules;
pub mod sync;
