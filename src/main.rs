use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use dotenv::dotenv;
use tokio::time::timeout;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use coursestore::config::Config;
use coursestore::datastore::{self, StorageService, StorageServiceImpl, Subscription};
use coursestore::log;
use coursestore::model::{Course, Record, Task};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let config = match env::var("COURSESTORE_CONFIG") {
        Ok(path) => Config::from_file(path)?,
        Err(_) => Config::default(),
    };
    log::setup(
        EnvFilter::try_from_env("COURSESTORE_LOG"),
        config.log.as_ref(),
    )?;

    info!("Starting coursestore: {}", env!("CARGO_PKG_VERSION"));

    let user_id = env::args().nth(1).unwrap_or_else(|| "demo-user".to_string());
    let store = Arc::new(datastore::open(&config.storage)?);
    let service = StorageServiceImpl::new(store);
    run(&service, &user_id).await?;

    info!("Finished coursestore");
    Ok(())
}

async fn run<S: StorageService>(service: &S, user_id: &str) -> Result<()> {
    let mut courses = service.add_course_listener(user_id).await?;
    let course = service
        .save_course(Course::new(user_id, "Getting started"))
        .await?;
    let mut tasks = service.add_task_listener(user_id, &course.id).await?;
    let task = service
        .save_task(&course.id, Task::new(user_id, "Say hello"))
        .await?;
    info!(course_id = %course.id, task_id = %task.id, "saved course and task");

    let mut done = service.get_task(&task.id, &course.id).await?;
    done.completed = true;
    service.update_task(&course.id, &done).await?;

    let new_owner = format!("{}-moved", user_id);
    service.update_user_id(user_id, &new_owner).await?;
    let course_owner = service.get_course(&course.id).await?.user_id;
    let task_owner = service.get_task(&task.id, &course.id).await?.user_id;
    info!(%course_owner, %task_owner, "owners after move");

    drain("course", &mut courses).await;
    drain("task", &mut tasks).await;
    service.remove_course_listener(courses);
    service.remove_task_listener(tasks);

    service.delete_all_for_user(&new_owner).await?;
    let course_left = !service.get_course(&course.id).await?.id.is_empty();
    let task_left = !service.get_task(&task.id, &course.id).await?.id.is_empty();
    info!(course_left, task_left, "after deleting the owner's courses");
    service.delete_task(&course.id, &task.id).await?;
    Ok(())
}

async fn drain<T: Record>(listener: &str, subscription: &mut Subscription<T>) {
    while let Ok(Some(event)) = timeout(Duration::from_millis(50), subscription.next()).await {
        match event {
            Ok(event) => info!(
                listener,
                id = event.record.id(),
                deleted = event.was_deleted,
                "change received"
            ),
            Err(err) => warn!(listener, err = %err, "listener error"),
        }
    }
}
