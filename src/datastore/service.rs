use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use super::error::DataStoreError;
use super::schema;
use super::storage::{DocumentPath, DocumentStore, Fields};
use super::subscription::Subscription;
use crate::model::{Course, Record, Task};

/// Course and task operations over a document store.
///
/// Every call is one independent request: nothing is cached, queued or
/// retried, and each call completes exactly once.
#[async_trait]
pub trait StorageService: Send + Sync {
    async fn add_task_listener(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> Result<Subscription<Task>, DataStoreError>;
    fn remove_task_listener(&self, subscription: Subscription<Task>);
    /// A missing task yields `Task::default()`.
    async fn get_task(&self, task_id: &str, course_id: &str) -> Result<Task, DataStoreError>;
    /// Returns the task with its generated `id`.
    async fn save_task(&self, course_id: &str, task: Task) -> Result<Task, DataStoreError>;
    async fn update_task(&self, course_id: &str, task: &Task) -> Result<(), DataStoreError>;
    async fn delete_task(&self, course_id: &str, task_id: &str) -> Result<(), DataStoreError>;
    /// Deletes the user's course documents. Their task collections stay.
    async fn delete_all_for_user(&self, user_id: &str) -> Result<(), DataStoreError>;
    /// Moves the user's courses to a new owner. Task owners stay.
    async fn update_user_id(
        &self,
        old_user_id: &str,
        new_user_id: &str,
    ) -> Result<(), DataStoreError>;
    async fn add_course_listener(
        &self,
        user_id: &str,
    ) -> Result<Subscription<Course>, DataStoreError>;
    fn remove_course_listener(&self, subscription: Subscription<Course>);
    async fn get_course(&self, course_id: &str) -> Result<Course, DataStoreError>;
    async fn save_course(&self, course: Course) -> Result<Course, DataStoreError>;
    async fn update_course(&self, course: &Course) -> Result<(), DataStoreError>;
    async fn delete_course(&self, course_id: &str) -> Result<(), DataStoreError>;
}

pub struct StorageServiceImpl<S: DocumentStore> {
    store: Arc<S>,
}

impl<S> StorageServiceImpl<S>
where
    S: DocumentStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    async fn fetch<T: Record>(&self, path: DocumentPath) -> Result<T, DataStoreError> {
        let snapshot = self.store.get(&path).await?;
        let record = snapshot
            .to_record::<T>()
            .map_err(|source| DataStoreError::Decode {
                path: path.to_string(),
                source,
            })?;
        Ok(match record {
            Some(record) => record.with_id(snapshot.id().to_string()),
            None => T::default(),
        })
    }
}

fn encode<T: Record>(record: &T) -> Result<Fields, DataStoreError> {
    record.to_fields().map_err(DataStoreError::Encode)
}

fn logged<T>(operation: &str, res: Result<T, DataStoreError>) -> Result<T, DataStoreError> {
    if let Err(error) = &res {
        error!(err = %error, operation, "Unable to execute storage request.");
    }
    res
}

#[async_trait]
impl<S> StorageService for StorageServiceImpl<S>
where
    S: DocumentStore,
{
    #[instrument(skip(self))]
    async fn add_task_listener(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> Result<Subscription<Task>, DataStoreError> {
        let res = async {
            let query = schema::tasks_owned_by(course_id, user_id)?;
            Ok::<_, DataStoreError>(Subscription::new(self.store.listen(query).await?))
        }
        .await;
        debug!(ok = res.is_ok(), "task listener added");
        logged("add_task_listener", res)
    }

    #[instrument(skip(self, subscription))]
    fn remove_task_listener(&self, subscription: Subscription<Task>) {
        subscription.remove();
        debug!("task listener removed");
    }

    #[instrument(skip(self))]
    async fn get_task(&self, task_id: &str, course_id: &str) -> Result<Task, DataStoreError> {
        let res = async { self.fetch::<Task>(schema::task(course_id, task_id)?).await }.await;
        logged("get_task", res)
    }

    #[instrument(skip(self, task))]
    async fn save_task(&self, course_id: &str, task: Task) -> Result<Task, DataStoreError> {
        let res = async {
            let fields = encode(&task)?;
            let path = self.store.add(&schema::tasks(course_id)?, fields).await?;
            Ok::<_, DataStoreError>(task.with_id(path.id().to_string()))
        }
        .await;
        logged("save_task", res)
    }

    #[instrument(skip(self, task), fields(task_id = %task.id))]
    async fn update_task(&self, course_id: &str, task: &Task) -> Result<(), DataStoreError> {
        let res = async {
            let path = schema::task(course_id, &task.id)?;
            Ok::<_, DataStoreError>(self.store.set(&path, encode(task)?).await?)
        }
        .await;
        logged("update_task", res)
    }

    #[instrument(skip(self))]
    async fn delete_task(&self, course_id: &str, task_id: &str) -> Result<(), DataStoreError> {
        let res = async {
            let path = schema::task(course_id, task_id)?;
            Ok::<_, DataStoreError>(self.store.delete(&path).await?)
        }
        .await;
        logged("delete_task", res)
    }

    #[instrument(skip(self))]
    async fn delete_all_for_user(&self, user_id: &str) -> Result<(), DataStoreError> {
        let res = async {
            let courses = self.store.query(&schema::courses_owned_by(user_id)?).await?;
            let results =
                join_all(courses.iter().map(|course| self.store.delete(&course.path))).await;
            for (course, res) in courses.iter().zip(results) {
                if let Err(err) = res {
                    warn!(path = %course.path, err = %err, "unable to delete course");
                }
            }
            info!(courses = courses.len(), "deleted courses owned by user");
            Ok::<_, DataStoreError>(())
        }
        .await;
        logged("delete_all_for_user", res)
    }

    #[instrument(skip(self))]
    async fn update_user_id(
        &self,
        old_user_id: &str,
        new_user_id: &str,
    ) -> Result<(), DataStoreError> {
        let res = async {
            let courses = self
                .store
                .query(&schema::courses_owned_by(old_user_id)?)
                .await?;
            let owner = Value::from(new_user_id);
            let updates = courses
                .iter()
                .map(|course| self.store.update(&course.path, schema::USER_ID, owner.clone()));
            let results = join_all(updates).await;
            for (course, res) in courses.iter().zip(results) {
                if let Err(err) = res {
                    warn!(path = %course.path, err = %err, "unable to update course owner");
                }
            }
            info!(courses = courses.len(), "moved courses to new owner");
            Ok::<_, DataStoreError>(())
        }
        .await;
        logged("update_user_id", res)
    }

    #[instrument(skip(self))]
    async fn add_course_listener(
        &self,
        user_id: &str,
    ) -> Result<Subscription<Course>, DataStoreError> {
        let res = async {
            let query = schema::courses_owned_by(user_id)?;
            Ok::<_, DataStoreError>(Subscription::new(self.store.listen(query).await?))
        }
        .await;
        debug!(ok = res.is_ok(), "course listener added");
        logged("add_course_listener", res)
    }

    #[instrument(skip(self, subscription))]
    fn remove_course_listener(&self, subscription: Subscription<Course>) {
        subscription.remove();
        debug!("course listener removed");
    }

    #[instrument(skip(self))]
    async fn get_course(&self, course_id: &str) -> Result<Course, DataStoreError> {
        let res = async { self.fetch::<Course>(schema::course(course_id)?).await }.await;
        logged("get_course", res)
    }

    #[instrument(skip(self, course))]
    async fn save_course(&self, course: Course) -> Result<Course, DataStoreError> {
        let res = async {
            let fields = encode(&course)?;
            let path = self.store.add(&schema::courses()?, fields).await?;
            Ok::<_, DataStoreError>(course.with_id(path.id().to_string()))
        }
        .await;
        logged("save_course", res)
    }

    #[instrument(skip(self, course), fields(course_id = %course.id))]
    async fn update_course(&self, course: &Course) -> Result<(), DataStoreError> {
        let res = async {
            let path = schema::course(&course.id)?;
            Ok::<_, DataStoreError>(self.store.set(&path, encode(course)?).await?)
        }
        .await;
        logged("update_course", res)
    }

    #[instrument(skip(self))]
    async fn delete_course(&self, course_id: &str) -> Result<(), DataStoreError> {
        let res = async {
            let path = schema::course(course_id)?;
            Ok::<_, DataStoreError>(self.store.delete(&path).await?)
        }
        .await;
        logged("delete_course", res)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rand::distributions::Alphanumeric;
    use rand::{thread_rng, Rng};
    use tokio::time::timeout;

    use super::*;
    use crate::datastore::{MemoryDocumentStore, StorageError};
    use crate::model::RecordEvent;

    fn service() -> (
        Arc<MemoryDocumentStore>,
        StorageServiceImpl<MemoryDocumentStore>,
    ) {
        let store = Arc::new(MemoryDocumentStore::new());
        (store.clone(), StorageServiceImpl::new(store))
    }

    fn random_id() -> String {
        thread_rng()
            .sample_iter(&Alphanumeric)
            .take(20)
            .map(char::from)
            .collect()
    }

    async fn next_event<T: Record>(subscription: &mut Subscription<T>) -> RecordEvent<T> {
        timeout(Duration::from_secs(1), subscription.next())
            .await
            .expect("no event in time")
            .expect("subscription closed")
            .unwrap()
    }

    #[tokio::test]
    async fn test_save_then_get_task() {
        // GIVEN
        let (_, service) = service();
        let course_id = random_id();
        let mut task = Task::new("u1", "Read chapter 3");
        task.priority = "High".into();

        // WHEN
        let saved = service.save_task(&course_id, task.clone()).await.unwrap();

        // THEN
        assert!(!saved.id.is_empty());
        let fetched = service.get_task(&saved.id, &course_id).await.unwrap();
        assert_eq!(fetched, task.with_id(saved.id.clone()));
    }

    #[tokio::test]
    async fn test_update_is_full_overwrite() {
        let (_, service) = service();
        let course_id = random_id();
        let mut task = Task::new("u1", "draft");
        task.description = "first".into();
        let saved = service.save_task(&course_id, task).await.unwrap();

        let mut replacement = Task::new("u1", "final").with_id(saved.id.clone());
        replacement.completed = true;
        service.update_task(&course_id, &replacement).await.unwrap();

        let fetched = service.get_task(&saved.id, &course_id).await.unwrap();
        assert_eq!(fetched, replacement);
        assert_eq!(fetched.description, "");
    }

    #[tokio::test]
    async fn test_get_after_delete_yields_default() {
        let (_, service) = service();
        let course_id = random_id();
        let saved = service
            .save_task(&course_id, Task::new("u1", "gone"))
            .await
            .unwrap();

        service.delete_task(&course_id, &saved.id).await.unwrap();

        let fetched = service.get_task(&saved.id, &course_id).await.unwrap();
        assert_eq!(fetched, Task::default());
        assert_eq!(service.get_course("nope").await.unwrap(), Course::default());
    }

    #[tokio::test]
    async fn test_update_without_id_fails() {
        let (_, service) = service();

        let res = service
            .update_task("c1", &Task::new("u1", "no id"))
            .await
            .unwrap_err();

        assert!(matches!(
            res,
            DataStoreError::Storage(StorageError::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn test_task_listener_reports_deletions() {
        // GIVEN
        let (_, service) = service();
        let course_id = random_id();
        let mut subscription = service.add_task_listener("u1", &course_id).await.unwrap();

        // WHEN
        let saved = service
            .save_task(&course_id, Task::new("u1", "watch me"))
            .await
            .unwrap();
        service
            .save_task(&course_id, Task::new("u2", "not mine"))
            .await
            .unwrap();
        let mut done = saved.clone();
        done.completed = true;
        service.update_task(&course_id, &done).await.unwrap();
        service.delete_task(&course_id, &saved.id).await.unwrap();

        // THEN
        let added = next_event(&mut subscription).await;
        assert!(!added.was_deleted);
        assert_eq!(added.record, saved);

        let modified = next_event(&mut subscription).await;
        assert!(!modified.was_deleted);
        assert!(modified.record.completed);

        let removed = next_event(&mut subscription).await;
        assert!(removed.was_deleted);
        assert_eq!(removed.record.id, saved.id);

        service.remove_task_listener(subscription);
    }

    #[tokio::test]
    async fn test_course_listeners_are_independent() {
        // GIVEN
        let (_, service) = service();
        let existing = service.save_course(Course::new("u1", "Rust")).await.unwrap();
        let first = service.add_course_listener("u1").await.unwrap();
        let mut second = service.add_course_listener("u1").await.unwrap();

        // WHEN
        service.remove_course_listener(first);
        let added = service.save_course(Course::new("u1", "Go")).await.unwrap();

        // THEN the remaining subscription sees the initial set, then the new course
        let initial = next_event(&mut second).await;
        assert_eq!(initial.record, existing);
        let event = next_event(&mut second).await;
        assert!(!event.was_deleted);
        assert_eq!(event.record, added);
    }

    #[tokio::test]
    async fn test_course_removal_survives_listener_lag() {
        // GIVEN a store whose change feed holds a single change
        let store = Arc::new(MemoryDocumentStore::with_capacity(1, 8));
        let service = StorageServiceImpl::new(store.clone());
        let course = service.save_course(Course::new("u1", "Rust")).await.unwrap();
        let mut subscription = service.add_course_listener("u1").await.unwrap();
        assert_eq!(next_event(&mut subscription).await.record, course);

        // WHEN the course is deleted and another user writes before the listener catches up
        service.delete_course(&course.id).await.unwrap();
        service.save_course(Course::new("u2", "Go")).await.unwrap();

        // THEN the lag is reported and the removal is still delivered
        let lagged = timeout(Duration::from_secs(1), subscription.next())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            lagged,
            Err(DataStoreError::Storage(StorageError::Lagged(_)))
        ));
        let removed = next_event(&mut subscription).await;
        assert!(removed.was_deleted);
        assert_eq!(removed.record, course);
        assert_eq!(1, store.len());
    }

    #[tokio::test]
    async fn test_delete_all_for_user_keeps_tasks() {
        // GIVEN
        let (store, service) = service();
        let mine = service.save_course(Course::new("u1", "Rust")).await.unwrap();
        let also_mine = service.save_course(Course::new("u1", "Go")).await.unwrap();
        let theirs = service.save_course(Course::new("u2", "C")).await.unwrap();
        let task = service
            .save_task(&mine.id, Task::new("u1", "exercise"))
            .await
            .unwrap();
        assert_eq!(4, store.len());

        // WHEN
        service.delete_all_for_user("u1").await.unwrap();

        // THEN
        assert_eq!(service.get_course(&mine.id).await.unwrap(), Course::default());
        assert_eq!(
            service.get_course(&also_mine.id).await.unwrap(),
            Course::default()
        );
        assert_eq!(service.get_course(&theirs.id).await.unwrap(), theirs);
        assert_eq!(service.get_task(&task.id, &mine.id).await.unwrap(), task);
    }

    #[tokio::test]
    async fn test_bulk_operations_without_matches() {
        let (store, service) = service();

        assert!(service.delete_all_for_user("nobody").await.is_ok());
        assert!(service.update_user_id("nobody", "someone").await.is_ok());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_update_user_id_leaves_tasks() {
        // GIVEN course C1 owned by U1 with task T1 under it
        let (_, service) = service();
        let course = Course::new("U1", "Algebra").with_id("C1".into());
        service.update_course(&course).await.unwrap();
        let task = Task::new("U1", "Homework").with_id("T1".into());
        service.update_task("C1", &task).await.unwrap();

        // WHEN
        service.update_user_id("U1", "U2").await.unwrap();

        // THEN
        assert_eq!(service.get_course("C1").await.unwrap().user_id, "U2");
        assert_eq!(service.get_course("C1").await.unwrap().title, "Algebra");
        assert_eq!(service.get_task("T1", "C1").await.unwrap().user_id, "U1");
    }

    #[tokio::test]
    async fn test_store_faults_are_surfaced() {
        let (store, service) = service();
        let course = service.save_course(Course::new("u1", "Rust")).await.unwrap();
        store.set_offline(true);

        for res in [
            service.delete_all_for_user("u1").await,
            service.update_user_id("u1", "u2").await,
            service.delete_course(&course.id).await,
        ] {
            assert!(matches!(
                res,
                Err(DataStoreError::Storage(StorageError::Unavailable(_)))
            ));
        }
        assert!(service.get_course(&course.id).await.is_err());
        assert!(service.add_course_listener("u1").await.is_err());

        store.set_offline(false);
        assert_eq!(service.get_course(&course.id).await.unwrap(), course);
    }
}
