pub mod edge;
pub mod item;
pub mod order;
