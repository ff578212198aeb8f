pub mod jwt;
pub mod logging;
pub mod query;
pub mod response;
