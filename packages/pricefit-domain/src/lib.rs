pub mod price;
pub mod ranking;
pub mod vector;
