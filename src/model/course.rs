use serde_derive::{Deserialize, Serialize};

use super::record::Record;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Course {
    #[serde(skip)]
    pub id: String,
    pub title: String,
    pub description: String,
    pub user_id: String,
}

impl Course {
    pub fn new(user_id: &str, title: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            title: title.to_string(),
            ..Default::default()
        }
    }
}

impl Record for Course {
    fn id(&self) -> &str {
        &self.id
    }

    fn with_id(self, id: String) -> Self {
        Self { id, ..self }
    }
}
