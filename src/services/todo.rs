use chrono::Utc;
use dashmap::DashMap;
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::models::Todo;

/// Fields that may be changed on an existing todo. Absent fields are left
/// untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTodo {
    pub title: Option<String>,
    pub description: Option<String>,
    pub completed: Option<bool>,
}

/// In-memory todo registry. Ids are monotonically increasing integers
/// rendered as strings, assigned at creation and never reused. Nothing is
/// persisted; a restart starts over at id 1.
pub struct TodoService {
    todos: DashMap<String, Todo>,
    next_id: AtomicU64,
}

impl TodoService {
    pub fn new() -> Self {
        Self {
            todos: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    fn generate_id(&self) -> String {
        self.next_id.fetch_add(1, Ordering::SeqCst).to_string()
    }

    pub fn create(&self, title: String, description: Option<String>) -> Todo {
        let id = self.generate_id();
        let now = Utc::now();
        let todo = Todo {
            id: id.clone(),
            title,
            description,
            completed: false,
            created_at: now,
            updated_at: now,
        };
        self.todos.insert(id, todo.clone());
        todo
    }

    /// All todos in id order
    pub fn get_all(&self) -> Vec<Todo> {
        let mut todos: Vec<Todo> = self.todos.iter().map(|e| e.value().clone()).collect();
        todos.sort_by_key(|t| t.id.parse::<u64>().unwrap_or(u64::MAX));
        todos
    }

    pub fn get_by_id(&self, id: &str) -> Option<Todo> {
        self.todos.get(id).map(|e| e.value().clone())
    }

    pub fn update(&self, id: &str, updates: UpdateTodo) -> Option<Todo> {
        let mut entry = self.todos.get_mut(id)?;
        if let Some(title) = updates.title {
            entry.title = title;
        }
        if let Some(description) = updates.description {
            entry.description = Some(description);
        }
        if let Some(completed) = updates.completed {
            entry.completed = completed;
        }
        entry.updated_at = Utc::now();
        Some(entry.clone())
    }

    pub fn delete(&self, id: &str) -> bool {
        self.todos.remove(id).is_some()
    }

    pub fn mark_completed(&self, id: &str) -> Option<Todo> {
        self.update(
            id,
            UpdateTodo {
                completed: Some(true),
                ..UpdateTodo::default()
            },
        )
    }

    pub fn mark_incomplete(&self, id: &str) -> Option<Todo> {
        self.update(
            id,
            UpdateTodo {
                completed: Some(false),
                ..UpdateTodo::default()
            },
        )
    }

    pub fn get_completed(&self) -> Vec<Todo> {
        self.get_all().into_iter().filter(|t| t.completed).collect()
    }

    pub fn get_pending(&self) -> Vec<Todo> {
        self.get_all().into_iter().filter(|t| !t.completed).collect()
    }

    pub fn clear(&self) {
        self.todos.clear();
    }
}

impl Default for TodoService {
    fn default() -> Self {
        Self::new()
    }
}
