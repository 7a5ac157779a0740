pub mod clock;
pub mod controller;
pub mod events;
pub mod store;
pub mod ticker;
