use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::canvas::{parse_hex_color, to_hex_color};
use crate::components::tools::LeavePolicy;
use crate::error::Result;

// ═══════════════════════════════════════════════════════════════════════════
// KEYBINDINGS
// ═══════════════════════════════════════════════════════════════════════════

/// A key press as delivered by the host.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct KeyEvent {
    /// Key name: a single character (`"z"`, `"B"`) or a named key.
    pub key: String,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub alt: bool,
    /// Cmd / Windows key.
    #[serde(default)]
    pub meta: bool,
}

impl KeyEvent {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            ..Self::default()
        }
    }

    pub fn ctrl(key: &str) -> Self {
        Self {
            ctrl: true,
            ..Self::new(key)
        }
    }

    pub fn ctrl_shift(key: &str) -> Self {
        Self {
            shift: true,
            ..Self::ctrl(key)
        }
    }
}

/// A single key combination (modifier flags + key name).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyCombo {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    /// Upper-cased key name.
    pub key: String,
}

impl KeyCombo {
    pub fn key(k: &str) -> Self {
        Self { ctrl: false, shift: false, alt: false, key: k.to_ascii_uppercase() }
    }
    pub fn ctrl_key(k: &str) -> Self {
        Self { ctrl: true, ..Self::key(k) }
    }
    pub fn ctrl_shift_key(k: &str) -> Self {
        Self { ctrl: true, shift: true, ..Self::key(k) }
    }

    fn is_bare(&self) -> bool {
        !self.ctrl && !self.shift && !self.alt
    }

    /// Whether `event` triggers this combo.
    ///
    /// Meta counts as Ctrl.  A bare combo (no modifiers) ignores Shift but
    /// never fires while Ctrl, Alt or Meta is held.
    pub fn matches(&self, event: &KeyEvent) -> bool {
        if !self.key.eq_ignore_ascii_case(event.key.trim()) {
            return false;
        }
        let ctrl = event.ctrl || event.meta;
        if self.is_bare() {
            return !ctrl && !event.alt;
        }
        self.ctrl == ctrl && self.shift == event.shift && self.alt == event.alt
    }

    /// Serialize to config string
    pub fn to_config_string(&self) -> String {
        let mut parts = Vec::new();
        if self.ctrl { parts.push("ctrl".to_string()); }
        if self.shift { parts.push("shift".to_string()); }
        if self.alt { parts.push("alt".to_string()); }
        parts.push(format!("key:{}", self.key));
        parts.join("+")
    }

    /// Deserialize from config string
    pub fn from_config_string(s: &str) -> Option<Self> {
        let mut combo = Self::key("");
        for part in s.split('+') {
            match part.trim() {
                "ctrl" => combo.ctrl = true,
                "shift" => combo.shift = true,
                "alt" => combo.alt = true,
                other => {
                    if let Some(key_name) = other.strip_prefix("key:") {
                        combo.key = key_name.trim().to_ascii_uppercase();
                    }
                }
            }
        }
        if combo.key.is_empty() { None } else { Some(combo) }
    }
}

/// Every action that can be bound to a shortcut.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BindableAction {
    Undo,
    Redo,
    ExportProject,
    ExportImage,
    ToolBrush,
    ToolEraser,
    ToolText,
}

impl BindableAction {
    pub fn all() -> &'static [BindableAction] {
        &[
            BindableAction::Undo,
            BindableAction::Redo,
            BindableAction::ExportProject,
            BindableAction::ExportImage,
            BindableAction::ToolBrush,
            BindableAction::ToolEraser,
            BindableAction::ToolText,
        ]
    }

    pub fn config_name(&self) -> &'static str {
        match self {
            BindableAction::Undo => "Undo",
            BindableAction::Redo => "Redo",
            BindableAction::ExportProject => "ExportProject",
            BindableAction::ExportImage => "ExportImage",
            BindableAction::ToolBrush => "ToolBrush",
            BindableAction::ToolEraser => "ToolEraser",
            BindableAction::ToolText => "ToolText",
        }
    }

    pub fn from_config_name(s: &str) -> Option<Self> {
        BindableAction::all().iter().copied().find(|a| a.config_name() == s)
    }
}

/// Keybinding map.  An action may have several combos (Redo has two).
#[derive(Clone, Debug, PartialEq)]
pub struct KeyBindings {
    pub bindings: HashMap<BindableAction, Vec<KeyCombo>>,
}

impl Default for KeyBindings {
    fn default() -> Self {
        use BindableAction::*;
        let mut map = HashMap::new();
        map.insert(Undo,          vec![KeyCombo::ctrl_key("Z")]);
        map.insert(Redo,          vec![KeyCombo::ctrl_key("Y"), KeyCombo::ctrl_shift_key("Z")]);
        map.insert(ExportProject, vec![KeyCombo::ctrl_key("S")]);
        map.insert(ExportImage,   vec![KeyCombo::ctrl_key("E")]);
        map.insert(ToolBrush,     vec![KeyCombo::key("B")]);
        map.insert(ToolEraser,    vec![KeyCombo::key("E")]);
        map.insert(ToolText,      vec![KeyCombo::key("T")]);
        Self { bindings: map }
    }
}

impl KeyBindings {
    pub fn get(&self, action: BindableAction) -> &[KeyCombo] {
        self.bindings.get(&action).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn set(&mut self, action: BindableAction, combos: Vec<KeyCombo>) {
        self.bindings.insert(action, combos);
    }

    /// The action `event` triggers, if any.  Modified combos are checked
    /// first so Ctrl+Shift+Z resolves to Redo, not Undo.
    pub fn resolve(&self, event: &KeyEvent) -> Option<BindableAction> {
        let mut best: Option<(usize, BindableAction)> = None;
        for &action in BindableAction::all() {
            for combo in self.get(action) {
                if combo.matches(event) {
                    let weight = combo.ctrl as usize + combo.shift as usize + combo.alt as usize;
                    if best.is_none_or(|(w, _)| weight > w) {
                        best = Some((weight, action));
                    }
                }
            }
        }
        best.map(|(_, action)| action)
    }

    /// Serialize all bindings for config file
    pub fn to_config_lines(&self) -> Vec<String> {
        BindableAction::all()
            .iter()
            .filter_map(|action| {
                let combos = self.bindings.get(action)?;
                let joined: Vec<String> = combos.iter().map(KeyCombo::to_config_string).collect();
                Some(format!("keybind.{}={}", action.config_name(), joined.join("|")))
            })
            .collect()
    }

    /// Load a single keybind line from config
    pub fn load_config_line(&mut self, action_name: &str, combo_str: &str) {
        let Some(action) = BindableAction::from_config_name(action_name) else {
            log::warn!("settings: unknown keybinding action '{}'", action_name);
            return;
        };
        let combos: Vec<KeyCombo> = combo_str
            .split('|')
            .filter_map(KeyCombo::from_config_string)
            .collect();
        if !combos.is_empty() {
            self.bindings.insert(action, combos);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// ENGINE SETTINGS
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, PartialEq)]
pub struct EngineSettings {
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// Fill of the initial layer.
    pub background: [u8; 4],
    /// 0 = unbounded.
    pub max_history: usize,
    pub min_zoom: f32,
    pub max_zoom: f32,
    /// Decode encoded layer content on a worker thread.
    pub background_restore: bool,
    pub leave_policy: LeavePolicy,
    /// TTF/OTF file the text tool falls back to.
    pub font_path: Option<PathBuf>,
    pub keybindings: KeyBindings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            canvas_width: 800,
            canvas_height: 800,
            background: [255, 255, 255, 255],
            max_history: 0,
            min_zoom: 0.1,
            max_zoom: 16.0,
            background_restore: true,
            leave_policy: LeavePolicy::Commit,
            font_path: None,
            keybindings: KeyBindings::default(),
        }
    }
}

impl EngineSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/nftcanvas/nftcanvas.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\nftcanvas\nftcanvas.cfg
    /// On macOS:   ~/Library/Application Support/nftcanvas/nftcanvas.cfg
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        let base = std::env::var("APPDATA").ok().map(PathBuf::from);
        #[cfg(target_os = "macos")]
        let base = std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join("Library").join("Application Support"));
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        let base = std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".config")));

        base.map(|dir| dir.join("nftcanvas").join("nftcanvas.cfg"))
    }

    /// Load from the default location (defaults if missing or unreadable).
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else { return Self::default() };
        match Self::load_from(&path) {
            Ok(s) => s,
            Err(e) => {
                log::debug!("settings: using defaults ({}: {})", path.display(), e);
                Self::default()
            }
        }
    }

    /// Read a settings file.  Fails only if the file cannot be read; bad
    /// values inside it fall back to their defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, self.to_config_string())?;
        Ok(())
    }

    /// Parse `key=value` lines over the defaults.
    pub fn parse(content: &str) -> Self {
        let d = Self::default();
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            match key {
                "canvas_width" => {
                    s.canvas_width = val.parse().ok().filter(|&v| v > 0).unwrap_or(d.canvas_width);
                }
                "canvas_height" => {
                    s.canvas_height = val.parse().ok().filter(|&v| v > 0).unwrap_or(d.canvas_height);
                }
                "background" => {
                    s.background = parse_hex_color(val).unwrap_or(d.background);
                }
                "max_history" => {
                    s.max_history = val.parse().unwrap_or(d.max_history);
                }
                "min_zoom" => {
                    s.min_zoom = val.parse().ok().filter(|v: &f32| *v > 0.0).unwrap_or(d.min_zoom);
                }
                "max_zoom" => {
                    s.max_zoom = val.parse().ok().filter(|v: &f32| *v > 0.0).unwrap_or(d.max_zoom);
                }
                "background_restore" => {
                    s.background_restore = val == "true";
                }
                "leave_policy" => {
                    s.leave_policy = LeavePolicy::from_name(val).unwrap_or(d.leave_policy);
                }
                "font_path" => {
                    s.font_path = if val.is_empty() { None } else { Some(PathBuf::from(val)) };
                }
                _ => {
                    // Parse keybinding lines: keybind.ActionName=combo|combo
                    if let Some(action_name) = key.strip_prefix("keybind.") {
                        s.keybindings.load_config_line(action_name, val);
                    } else {
                        log::warn!("settings: ignoring unknown key '{}'", key);
                    }
                }
            }
        }
        if s.min_zoom > s.max_zoom {
            s.min_zoom = d.min_zoom;
            s.max_zoom = d.max_zoom;
        }
        s
    }

    pub fn to_config_string(&self) -> String {
        let mut lines = vec![
            format!("canvas_width={}", self.canvas_width),
            format!("canvas_height={}", self.canvas_height),
            format!("background={}", to_hex_color(self.background)),
            format!("max_history={}", self.max_history),
            format!("min_zoom={}", self.min_zoom),
            format!("max_zoom={}", self.max_zoom),
            format!("background_restore={}", self.background_restore),
            format!("leave_policy={}", self.leave_policy.name()),
            format!(
                "font_path={}",
                self.font_path.as_ref().map(|p| p.display().to_string()).unwrap_or_default()
            ),
        ];
        lines.extend(self.keybindings.to_config_lines());
        let mut out = lines.join("\n");
        out.push('\n');
        out
    }

    pub fn clamp_zoom(&self, zoom: f32) -> f32 {
        if !zoom.is_finite() {
            return 1.0f32.clamp(self.min_zoom, self.max_zoom);
        }
        zoom.clamp(self.min_zoom, self.max_zoom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_shortcuts() {
        let kb = KeyBindings::default();
        assert_eq!(kb.resolve(&KeyEvent::ctrl("z")), Some(BindableAction::Undo));
        assert_eq!(kb.resolve(&KeyEvent::ctrl("y")), Some(BindableAction::Redo));
        assert_eq!(kb.resolve(&KeyEvent::ctrl_shift("Z")), Some(BindableAction::Redo));
        assert_eq!(kb.resolve(&KeyEvent::ctrl("s")), Some(BindableAction::ExportProject));
        assert_eq!(kb.resolve(&KeyEvent::ctrl("e")), Some(BindableAction::ExportImage));
        assert_eq!(kb.resolve(&KeyEvent::new("b")), Some(BindableAction::ToolBrush));
        assert_eq!(kb.resolve(&KeyEvent::new("E")), Some(BindableAction::ToolEraser));
        assert_eq!(kb.resolve(&KeyEvent::new("t")), Some(BindableAction::ToolText));
    }

    #[test]
    fn bare_letters_ignore_ctrl_alt_meta() {
        let kb = KeyBindings::default();
        assert_eq!(kb.resolve(&KeyEvent::ctrl("b")), None);
        let alt_t = KeyEvent { alt: true, ..KeyEvent::new("t") };
        assert_eq!(kb.resolve(&alt_t), None);
        let meta_b = KeyEvent { meta: true, ..KeyEvent::new("b") };
        assert_eq!(kb.resolve(&meta_b), None);
        // Cmd acts as Ctrl for modified shortcuts
        let cmd_z = KeyEvent { meta: true, ..KeyEvent::new("z") };
        assert_eq!(kb.resolve(&cmd_z), Some(BindableAction::Undo));
    }

    #[test]
    fn config_round_trip() {
        let mut s = EngineSettings::default();
        s.canvas_width = 640;
        s.max_history = 25;
        s.leave_policy = LeavePolicy::Revert;
        s.background = [10, 20, 30, 255];
        s.keybindings.set(BindableAction::Undo, vec![KeyCombo::ctrl_key("U")]);
        let parsed = EngineSettings::parse(&s.to_config_string());
        assert_eq!(parsed, s);
    }

    #[test]
    fn saved_file_loads_back() {
        let dir = std::env::temp_dir().join(format!("nftcanvas-settings-{}", std::process::id()));
        let path = dir.join("nested").join("nftcanvas.cfg");
        let mut s = EngineSettings::default();
        s.canvas_height = 321;
        s.save_to(&path).unwrap();
        assert_eq!(EngineSettings::load_from(&path).unwrap(), s);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn corrupt_values_fall_back_to_defaults() {
        let s = EngineSettings::parse(
            "canvas_width=wide\ncanvas_height=0\nbackground=#zzzzzz\nmin_zoom=20\nmax_zoom=2\nnonsense\nkeybind.Undo=ctrl",
        );
        let d = EngineSettings::default();
        assert_eq!(s.canvas_width, d.canvas_width);
        assert_eq!(s.canvas_height, d.canvas_height);
        assert_eq!(s.background, d.background);
        assert_eq!((s.min_zoom, s.max_zoom), (d.min_zoom, d.max_zoom));
        assert_eq!(s.keybindings, d.keybindings);
    }

    #[test]
    fn redo_accepts_multiple_combos_from_config() {
        let s = EngineSettings::parse("keybind.Redo=ctrl+key:R|alt+key:R");
        let alt_r = KeyEvent { alt: true, ..KeyEvent::new("r") };
        assert_eq!(s.keybindings.resolve(&alt_r), Some(BindableAction::Redo));
        assert_eq!(s.keybindings.resolve(&KeyEvent::ctrl("y")), None);
    }

    #[test]
    fn zoom_is_clamped() {
        let s = EngineSettings::default();
        assert_eq!(s.clamp_zoom(100.0), 16.0);
        assert_eq!(s.clamp_zoom(0.0), 0.1);
        assert_eq!(s.clamp_zoom(f32::NAN), 1.0);
    }
}
