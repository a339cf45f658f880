pub mod coordinator;
pub mod identity;
pub mod linker;
pub mod recurrence;
pub mod scheduler;
pub mod validator;
