use serde::{Deserialize, Serialize};

use crate::model::REGION_MARKER;

/// What happens to entity-scoped work whose entity is removed before it runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetiredEntityPolicy {
    /// Log a warning and drop the task. Scheduling against an entity that is
    /// already gone fails with `DispatchError::EntityRetired`.
    #[default]
    Drop,
    /// Run the task on the global region instead.
    Global,
}

/// Dispatcher configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Symbol whose presence marks a regionized host.
    pub marker: String,
    /// Thread name for fallback async workers. The pool is shared by the
    /// whole process, so only the first regionized dispatcher's name is used.
    pub async_thread_name: String,
    pub retired_entity: RetiredEntityPolicy,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            marker: REGION_MARKER.to_string(),
            async_thread_name: "worldspace-async".to_string(),
            retired_entity: RetiredEntityPolicy::Drop,
        }
    }
}
