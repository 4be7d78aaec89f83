pub mod claims;
pub mod standardized;
