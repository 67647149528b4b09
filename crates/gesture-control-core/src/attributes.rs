use crate::CoreResult;

/// Config key holding the name of the camera to open on start.
pub const SELECTED_CAMERA_KEY: &str = "camera_selecionada";

/// Generic key-value access to persisted configuration.
///
/// Implementations must persist an update before returning `Ok`.
pub trait AttributeStore: Send + Sync {
    /// Current value for `key`, or `None` if unset.
    fn read_attribute(&self, key: &str) -> CoreResult<Option<String>>;

    /// Set `key` to `value` and persist it.
    fn update_attribute(&self, key: &str, value: &str) -> CoreResult<()>;
}
