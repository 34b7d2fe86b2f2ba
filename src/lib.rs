pub mod catalog;
pub mod engine;
pub mod images;
pub mod limits;
pub mod model;
pub mod normalize;
pub mod notify;
pub mod observability;
pub mod remote;
