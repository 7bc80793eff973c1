pub mod course;
pub mod record;
pub mod task;

pub use course::Course;
pub use record::{Record, RecordEvent};
pub use task::Task;
