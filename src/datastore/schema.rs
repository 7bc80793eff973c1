//! Where courses and tasks live, and the names of the fields the storage
//! layer queries on. Every read and write path goes through these builders.

use super::storage::{CollectionPath, DocumentPath, Query, StorageError};

pub const COURSE_COLLECTION: &str = "Course";
pub const TASK_COLLECTION: &str = "Task";
pub const USER_ID: &str = "userId";

pub fn courses() -> Result<CollectionPath, StorageError> {
    CollectionPath::root(COURSE_COLLECTION)
}

pub fn course(course_id: &str) -> Result<DocumentPath, StorageError> {
    courses()?.doc(course_id)
}

/// Tasks are always nested under their course.
pub fn tasks(course_id: &str) -> Result<CollectionPath, StorageError> {
    course(course_id)?.collection(TASK_COLLECTION)
}

pub fn task(course_id: &str, task_id: &str) -> Result<DocumentPath, StorageError> {
    tasks(course_id)?.doc(task_id)
}

pub fn courses_owned_by(user_id: &str) -> Result<Query, StorageError> {
    Ok(Query::new(courses()?).where_equal_to(USER_ID, user_id))
}

pub fn tasks_owned_by(course_id: &str, user_id: &str) -> Result<Query, StorageError> {
    Ok(Query::new(tasks(course_id)?).where_equal_to(USER_ID, user_id))
}
