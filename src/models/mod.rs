pub mod task;
pub mod user;

pub use task::{Task, TaskFields, TaskInput, TaskQuery, TaskStatus, TaskWithOwner};
pub use user::{User, UserFields, UserInput, UserQuery, UserResponse};
