pub mod organization;
pub mod route;
pub mod status;
pub mod stop;
pub mod user;
