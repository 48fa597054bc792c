use std::env;

#[derive(Clone, Debug)]
pub struct CoordinatorConfig {
    pub action_namespace: String,
    pub action_id: String,
    pub event_capacity: usize,
    pub enumerate_on_first_stream: bool,
    pub default_to_first_device: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            action_namespace: "group".to_string(),
            action_id: "VIDEO_CHANGE".to_string(),
            event_capacity: 100,
            enumerate_on_first_stream: true,
            default_to_first_device: true,
        }
    }
}

impl CoordinatorConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            action_namespace: env::var("MESH_VIDEO_ACTION_NAMESPACE")
                .unwrap_or(defaults.action_namespace),
            action_id: env::var("MESH_VIDEO_ACTION_ID")
                .unwrap_or(defaults.action_id),
            event_capacity: env::var("MESH_VIDEO_EVENT_CAPACITY")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .unwrap_or(defaults.event_capacity)
                .max(1),
            enumerate_on_first_stream: env_flag(
                "MESH_VIDEO_ENUMERATE_ON_FIRST_STREAM",
                defaults.enumerate_on_first_stream,
            ),
            default_to_first_device: env_flag(
                "MESH_VIDEO_DEFAULT_TO_FIRST_DEVICE",
                defaults.default_to_first_device,
            ),
        }
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(value) => parse_flag(&value).unwrap_or(default),
        Err(_) => default,
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
