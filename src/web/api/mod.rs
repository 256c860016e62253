pub mod error;
pub mod sondes;
pub mod status;
