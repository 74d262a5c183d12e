pub mod client;
pub mod customer;
pub mod identity;
pub mod model;
pub mod plan;
pub mod subs;
