pub mod domain;
pub mod resume;
pub mod session;
