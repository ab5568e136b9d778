use std::time::SystemTime;

use crate::models::{SourceType, TaskStatus};

/// Columns tasks may be ordered by. These are the only identifiers ever
/// interpolated into task queries; every other filter value is bound.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum SortColumn {
    #[default]
    UpdatedAt,
    CreatedAt,
    FetchedAt,
    Priority,
    Status,
    Title,
}

impl SortColumn {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::UpdatedAt => "updated_at",
            Self::CreatedAt => "created_at",
            Self::FetchedAt => "fetched_at",
            Self::Priority => "priority",
            Self::Status => "status",
            Self::Title => "title",
        }
    }
}

impl std::str::FromStr for SortColumn {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "updated_at" => Ok(Self::UpdatedAt),
            "created_at" => Ok(Self::CreatedAt),
            "fetched_at" => Ok(Self::FetchedAt),
            "priority" => Ok(Self::Priority),
            "status" => Ok(Self::Status),
            "title" => Ok(Self::Title),
            _ => Err(()),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct TaskSort {
    pub column: SortColumn,
    pub descending: bool,
}

impl Default for TaskSort {
    fn default() -> Self {
        Self {
            column: SortColumn::UpdatedAt,
            descending: true,
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TaskFilter {
    pub source_id: Option<String>,
    pub source_type: Option<SourceType>,
    pub status: Option<TaskStatus>,
    pub priority: Option<u8>,
    /// Case-insensitive substring match on title and description.
    pub query: Option<String>,
    pub fetched_before: Option<SystemTime>,
    pub sort: TaskSort,
    /// `None` returns every matching row.
    pub limit: Option<usize>,
    pub offset: usize,
}

impl TaskFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    pub fn source_type(mut self, source_type: SourceType) -> Self {
        self.source_type = Some(source_type);
        self
    }

    pub fn status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn priority(mut self, priority: u8) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn fetched_before(mut self, at: SystemTime) -> Self {
        self.fetched_before = Some(at);
        self
    }

    pub fn sort_by(mut self, column: SortColumn, descending: bool) -> Self {
        self.sort = TaskSort { column, descending };
        self
    }

    pub fn page(mut self, limit: usize, offset: usize) -> Self {
        self.limit = Some(limit);
        self.offset = offset;
        self
    }
}
