pub mod neighbour;
pub mod packet;
pub mod queue;
pub mod route;
pub mod tables;
