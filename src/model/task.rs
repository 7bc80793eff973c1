use serde_derive::{Deserialize, Serialize};

use super::record::Record;

/// Task is a unit of work inside a course.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Task {
    #[serde(skip)]
    pub id: String,
    pub title: String,
    pub priority: String,
    pub due_date: String,
    pub due_time: String,
    pub description: String,
    pub url: String,
    pub flag: bool,
    pub completed: bool,
    pub user_id: String,
}

impl Task {
    pub fn new(user_id: &str, title: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            title: title.to_string(),
            ..Default::default()
        }
    }
}

impl Record for Task {
    fn id(&self) -> &str {
        &self.id
    }

    fn with_id(self, id: String) -> Self {
        Self { id, ..self }
    }
}
