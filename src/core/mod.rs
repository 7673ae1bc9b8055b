pub mod clients;
pub mod oauth;
pub mod pipeline;
pub mod queue;
pub mod store;
pub mod vault;
