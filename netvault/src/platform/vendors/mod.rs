//! Built-in vendor profiles.

pub mod cisco_ios;
pub mod mikrotik;
