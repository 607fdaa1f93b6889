pub mod add;
pub mod check;
pub mod common;
pub mod delete;
pub mod edit;
pub mod list;
pub mod status;
pub mod sync;
pub mod unblock;
