pub mod catalog;
pub mod php;
