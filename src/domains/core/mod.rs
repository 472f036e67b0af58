pub mod repository;

pub use repository::{FindById, SoftDeletable};
