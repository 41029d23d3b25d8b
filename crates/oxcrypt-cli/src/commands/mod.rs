pub mod mount;
pub mod providers;
