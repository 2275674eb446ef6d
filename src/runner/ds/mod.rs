pub mod env_record;
pub mod error;
pub mod object;
pub mod operations;
pub mod value;
