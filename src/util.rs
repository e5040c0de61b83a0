const MONITOR_URL: &str = "MONITOR_URL";

pub fn get_monitor_url() -> Option<String> {
    std::env::var(MONITOR_URL).ok()
}

const MONITOR_CONFIG: &str = "MONITOR_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "./monitor.json";

pub fn get_default_config_path() -> String {
    let path_from_env = std::env::var(MONITOR_CONFIG);
    path_from_env.unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
}
