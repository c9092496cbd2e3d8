use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CURRENT_VERSION: u32 = 2;
const SETTINGS_FILENAME: &str = "config.yaml";
pub const APP_NAME: &str = "pdf-binder";

/// Zoom, gesture and render-scale tunables of the viewer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerSettings {
    pub min_zoom: f32,
    pub max_zoom: f32,
    pub tap_zoom_factor: f32,
    pub zoom_step: f32,
    pub wheel_zoom_step: f32,
    pub lock_drag_axis: bool,
    pub hires_debounce_ms: u64,
    /// Upper bound for any render scale, hi-res included
    pub max_render_scale: f32,
    /// Render scale used when fit-to-width cannot be computed
    pub fallback_scale: f32,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            min_zoom: 0.5,
            max_zoom: 4.0,
            tap_zoom_factor: 2.0,
            zoom_step: 1.3,
            wheel_zoom_step: 0.01,
            lock_drag_axis: false,
            hires_debounce_ms: 300,
            max_render_scale: 6.0,
            fallback_scale: 1.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Shortest term searched inside the open document
    pub min_term_len: usize,
    /// Shortest term searched across the binder
    pub global_min_term_len: usize,
    /// Characters of context either side of a content match
    pub snippet_radius: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            min_term_len: crate::search::DEFAULT_MIN_TERM_LEN,
            global_min_term_len: 3,
            snippet_radius: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Rendered pages kept per open document
    pub cache_size: usize,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self { cache_size: 8 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub viewer: ViewerSettings,

    #[serde(default)]
    pub search: SearchSettings,

    #[serde(default)]
    pub render: RenderSettings,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            viewer: ViewerSettings::default(),
            search: SearchSettings::default(),
            render: RenderSettings::default(),
            log_level: default_log_level(),
        }
    }
}

#[must_use]
pub fn preferred_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

/// Load settings from the user config directory, writing defaults when
/// no file exists yet. Problems are logged and fall back to defaults.
#[must_use]
pub fn load_settings() -> Settings {
    let Some(path) = preferred_config_path() else {
        warn!("Could not determine config directory, using default settings");
        return Settings::default();
    };
    if path.exists() {
        load_settings_from_path(&path)
    } else {
        info!("Settings file not found, creating with defaults at {path:?}");
        let settings = Settings::default();
        save_settings_to_file(&settings, &path);
        settings
    }
}

#[must_use]
pub fn load_settings_from_path(path: &Path) -> Settings {
    match fs::read_to_string(path) {
        Ok(content) => match serde_yaml::from_str::<Settings>(&content) {
            Ok(mut settings) => {
                debug!("Loaded settings from {path:?}");

                if settings.version < CURRENT_VERSION {
                    migrate_settings(&mut settings);
                    save_settings_to_file(&settings, path);
                }
                settings
            }
            Err(e) => {
                error!("Failed to parse settings file {path:?}: {e}");
                Settings::default()
            }
        },
        Err(e) => {
            error!("Failed to read settings file {path:?}: {e}");
            Settings::default()
        }
    }
}

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );

    // v1 had no upper bound on render scale
    if settings.version < 2 && settings.viewer.max_render_scale <= 0.0 {
        settings.viewer.max_render_scale = ViewerSettings::default().max_render_scale;
    }

    settings.version = CURRENT_VERSION;
}

pub fn save_settings_to_file(settings: &Settings, path: &Path) {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Failed to create config directory {parent:?}: {e}");
                return;
            }
        }
    }

    let content = match generate_settings_yaml(settings) {
        Ok(content) => content,
        Err(e) => {
            error!("Failed to serialize settings: {e}");
            return;
        }
    };

    match fs::write(path, content) {
        Ok(()) => debug!("Saved settings to {path:?}"),
        Err(e) => error!("Failed to save settings to {path:?}: {e}"),
    }
}

fn generate_settings_yaml(settings: &Settings) -> Result<String, serde_yaml::Error> {
    let mut content = String::from(SETTINGS_HEADER);
    content.push_str(&serde_yaml::to_string(settings)?);
    Ok(content)
}

const SETTINGS_HEADER: &str = r#"# ============================================================================
# pdf-binder settings
# ============================================================================
# viewer.min_zoom / max_zoom     zoom range of the page view
# viewer.tap_zoom_factor         zoom reached by double tap
# viewer.zoom_step               factor of the zoom in/out buttons
# viewer.wheel_zoom_step         zoom change per wheel unit
# viewer.hires_debounce_ms       idle time before a sharper re-render
# viewer.max_render_scale        largest render scale ever requested
# search.min_term_len            shortest in-document search term
# search.global_min_term_len     shortest binder-wide search term
# render.cache_size              rendered pages kept per document

"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sections_take_defaults() {
        let settings: Settings = serde_yaml::from_str("version: 2\nviewer:\n  max_zoom: 6.0\n")
            .expect("valid yaml");
        assert_eq!(settings.viewer.max_zoom, 6.0);
        assert_eq!(settings.viewer.min_zoom, 0.5);
        assert_eq!(settings.search, SearchSettings::default());
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    fn save_then_load_keeps_values() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join(SETTINGS_FILENAME);

        let mut settings = Settings::default();
        settings.search.snippet_radius = 20;
        settings.viewer.lock_drag_axis = true;
        save_settings_to_file(&settings, &path);

        let loaded = load_settings_from_path(&path);
        assert_eq!(loaded, settings);
    }

    #[test]
    fn old_versions_are_migrated_and_rewritten() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(SETTINGS_FILENAME);
        fs::write(&path, "version: 1\nviewer:\n  max_render_scale: 0.0\n").expect("write");

        let loaded = load_settings_from_path(&path);
        assert_eq!(loaded.version, CURRENT_VERSION);
        assert_eq!(loaded.viewer.max_render_scale, 6.0);

        let on_disk = fs::read_to_string(&path).expect("read");
        assert!(on_disk.contains("version: 2"));
    }

    #[test]
    fn unreadable_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(SETTINGS_FILENAME);
        fs::write(&path, "viewer: [not, a, map]").expect("write");
        assert_eq!(load_settings_from_path(&path), Settings::default());
    }
}
