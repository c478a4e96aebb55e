pub mod position;
pub mod price;
