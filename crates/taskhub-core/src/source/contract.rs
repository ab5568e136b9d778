use std::collections::BTreeMap;
use std::time::SystemTime;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{CoreError, SourceType, Task};

pub type AdapterResult<T> = Result<T, CoreError>;

pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Paging request. Zero values are not errors: adapters replace them with
/// page 1 and their own default page size via [`FetchOptions::normalized`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct FetchOptions {
    pub page: u32,
    pub page_size: u32,
}

impl FetchOptions {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }

    pub fn normalized(self, default_page_size: u32) -> Self {
        let default_page_size = default_page_size.max(1);
        Self {
            page: self.page.max(1),
            page_size: if self.page_size < 1 {
                default_page_size
            } else {
                self.page_size
            },
        }
    }

    /// Zero-based index of the first item on this page.
    pub fn offset(self) -> usize {
        let page = usize::try_from(self.page.saturating_sub(1)).unwrap_or(usize::MAX);
        let page_size = usize::try_from(self.page_size).unwrap_or(usize::MAX);
        page.saturating_mul(page_size)
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct FetchResult {
    pub items: Vec<Task>,
    pub total: usize,
    pub has_more: bool,
}

impl FetchResult {
    pub fn empty() -> Self {
        Self::default()
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub author: String,
    pub body: String,
    pub created_at: SystemTime,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ItemDetail {
    pub task: Task,
    pub rendered_body: String,
    pub metadata: BTreeMap<String, String>,
    pub comments: Vec<Comment>,
}

impl ItemDetail {
    pub fn new(task: Task, rendered_body: impl Into<String>) -> Self {
        Self {
            task,
            rendered_body: rendered_body.into(),
            metadata: BTreeMap::new(),
            comments: Vec::new(),
        }
    }
}

/// A remote operation offered on one item, e.g. "transition to done" or
/// "approve".
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Action {
    pub id: String,
    pub name: String,
    pub requires_input: bool,
    pub input_prompt: Option<String>,
}

impl Action {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            requires_input: false,
            input_prompt: None,
        }
    }

    pub fn with_input(mut self, prompt: impl Into<String>) -> Self {
        self.requires_input = true;
        self.input_prompt = Some(prompt.into());
        self
    }
}

/// The capability set every remote system is presented through.
///
/// Neither the poller nor the store branch on the concrete adapter. Errors
/// an adapter returns should carry [`CoreErrorKind::Authentication`] when the
/// credentials need user attention; every other kind is treated as transient.
///
/// [`CoreErrorKind::Authentication`]: crate::models::CoreErrorKind::Authentication
#[async_trait]
pub trait Source: Send + Sync {
    fn source_type(&self) -> SourceType;

    /// Authenticates and returns a human readable identity such as the
    /// account name. Used to test credentials, not for polling.
    async fn validate_connection(&self) -> AdapterResult<String>;

    async fn fetch_items(&self, options: FetchOptions) -> AdapterResult<FetchResult>;

    async fn item_detail(&self, source_item_id: &str) -> AdapterResult<ItemDetail>;

    async fn actions(&self, source_item_id: &str) -> AdapterResult<Vec<Action>>;

    /// Performs a remote mutation. Unknown action ids must fail with
    /// [`unsupported_action`](crate::source::unsupported_action).
    async fn execute_action(
        &self,
        source_item_id: &str,
        action: &Action,
        input: Option<&str>,
    ) -> AdapterResult<()>;

    /// Adapters without remote search keep this default.
    async fn search(&self, _query: &str, _options: FetchOptions) -> AdapterResult<FetchResult> {
        Ok(FetchResult::empty())
    }
}
