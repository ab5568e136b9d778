use crate::models::{CoreError, CoreErrorKind, SourceType, Task};
use crate::source::{Action, FetchOptions, FetchResult};

/// Stable task id for an item of one configured source.
pub fn derive_task_id(source_id: &str, source_item_id: &str) -> String {
    format!("{source_id}:{source_item_id}")
}

/// Paginates an already fetched window for adapters that cannot page
/// remotely.
pub fn paginate(items: Vec<Task>, options: FetchOptions, default_page_size: u32) -> FetchResult {
    let options = options.normalized(default_page_size);
    let total = items.len();
    let offset = options.offset().min(total);
    let page_size = usize::try_from(options.page_size).unwrap_or(usize::MAX);
    let end = offset.saturating_add(page_size).min(total);

    FetchResult {
        items: items.into_iter().skip(offset).take(end - offset).collect(),
        total,
        has_more: end < total,
    }
}

pub fn unsupported_action(source_type: SourceType, action_id: &str) -> CoreError {
    CoreError::new(
        CoreErrorKind::UnsupportedAction,
        format!(
            "action '{action_id}' is not supported by the {} source",
            source_type.display_name()
        ),
    )
    .for_source(source_type)
    .during("execute_action")
}

pub fn missing_action_input(source_type: SourceType, action: &Action) -> CoreError {
    let prompt = action.input_prompt.as_deref().unwrap_or("input");
    CoreError::new(
        CoreErrorKind::InvalidInput,
        format!("action '{}' requires {prompt}", action.id),
    )
    .for_source(source_type)
    .during("execute_action")
}

/// Returns the trimmed input an action needs, or the matching error when it
/// was not supplied.
pub fn action_input<'a>(
    source_type: SourceType,
    action: &Action,
    input: Option<&'a str>,
) -> Result<Option<&'a str>, CoreError> {
    if !action.requires_input {
        return Ok(None);
    }
    match input.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => Ok(Some(value)),
        None => Err(missing_action_input(source_type, action)),
    }
}
