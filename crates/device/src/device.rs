//! The `Device` model and its path-building methods.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Protocol used to push files to a device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferProtocol {
    /// Transfers disabled for this device.
    #[default]
    #[serde(rename = "", alias = "none")]
    None,
    Ftp,
    Ftps,
    Sftp,
}

impl fmt::Display for TransferProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransferProtocol::None => "none",
            TransferProtocol::Ftp => "ftp",
            TransferProtocol::Ftps => "ftps",
            TransferProtocol::Sftp => "sftp",
        };
        f.write_str(s)
    }
}

/// Which image to send alongside a ROM.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    #[default]
    Cover,
    Screenshot,
}

/// Per-system folder configuration.
///
/// Device presets historically stored a bare folder name per system;
/// newer presets use a map with an optional `game_folders` flag. Both
/// forms deserialize transparently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SystemPathConfig {
    /// Legacy form: just the folder name. Never uses game folders.
    Folder(String),
    Settings {
        #[serde(default)]
        folder: Option<String>,
        #[serde(default)]
        game_folders: bool,
    },
}

/// A gaming device with ROM organization and transfer configuration.
///
/// Credential storage and encryption are the catalog application's
/// concern; `transfer_password` arrives here already decrypted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Device {
    pub name: String,
    pub slug: String,

    /// Root path on the device under which all system folders live,
    /// e.g. "Roms/", "/Roms/", "ROMS/".
    pub root_path: String,
    /// Per-system folder config keyed by system slug.
    pub system_paths: HashMap<String, SystemPathConfig>,

    pub transfer_protocol: TransferProtocol,
    pub transfer_host: String,
    /// Port override; `None` falls back to the protocol default.
    pub transfer_port: Option<u16>,
    pub transfer_user: String,
    pub transfer_password: String,
    /// Anonymous FTP login (credentials ignored).
    pub transfer_anonymous: bool,
    /// Absolute storage mount point on the device, e.g. "/mnt/SDCARD".
    pub transfer_path_prefix: String,

    /// Send companion images along with ROMs.
    pub include_images: bool,
    pub image_kind: ImageKind,
    /// Image path pattern. Placeholders: `{root_path}`, `{system}`,
    /// `{romname}`, `{romname_ext}`.
    pub image_path_template: String,
    /// Maximum image width in pixels (resize keeps aspect ratio).
    pub image_max_width: Option<u32>,
}

impl Default for Device {
    fn default() -> Self {
        Self {
            name: String::new(),
            slug: String::new(),
            root_path: "Roms/".to_string(),
            system_paths: HashMap::new(),
            transfer_protocol: TransferProtocol::None,
            transfer_host: String::new(),
            transfer_port: None,
            transfer_user: String::new(),
            transfer_password: String::new(),
            transfer_anonymous: false,
            transfer_path_prefix: String::new(),
            include_images: false,
            image_kind: ImageKind::Cover,
            image_path_template: String::new(),
            image_max_width: None,
        }
    }
}

impl Device {
    /// Folder name for a system, falling back to the upper-cased slug.
    pub fn system_folder(&self, system_slug: &str) -> String {
        match self.system_paths.get(system_slug) {
            Some(SystemPathConfig::Folder(name)) => name.clone(),
            Some(SystemPathConfig::Settings { folder, .. }) => folder
                .clone()
                .unwrap_or_else(|| system_slug.to_uppercase()),
            None => system_slug.to_uppercase(),
        }
    }

    /// Whether ROMs for a system go into per-game subfolders.
    pub fn game_folders_for_system(&self, system_slug: &str) -> bool {
        match self.system_paths.get(system_slug) {
            Some(SystemPathConfig::Settings { game_folders, .. }) => *game_folders,
            _ => false,
        }
    }

    /// Full device-side path for a ROM, relative to nothing in particular:
    /// `{root}/{system_folder}[/{game_name}]/{filename}`.
    pub fn rom_path(&self, system_slug: &str, game_name: &str, filename: &str) -> String {
        let mut parts = vec![self.root_path.trim_matches('/').to_string()];
        parts.push(self.system_folder(system_slug));
        if self.game_folders_for_system(system_slug) {
            parts.push(game_name.to_string());
        }
        parts.push(filename.to_string());
        parts.join("/")
    }

    /// Default port for the configured protocol.
    pub fn default_port(&self) -> u16 {
        match self.transfer_protocol {
            TransferProtocol::Sftp => 22,
            _ => 21,
        }
    }

    /// Configured port, or the protocol default.
    pub fn effective_port(&self) -> u16 {
        self.transfer_port.unwrap_or_else(|| self.default_port())
    }

    /// Whether this device can be transferred to at all.
    pub fn has_transfer_config(&self) -> bool {
        self.transfer_protocol != TransferProtocol::None && !self.transfer_host.is_empty()
    }

    /// Full remote path for transfers: `transfer_path_prefix` merged with
    /// `root_path`, plus an optional relative suffix.
    ///
    /// Slash handling is normalized so `"/mnt/SDCARD" + "Roms/"` and
    /// `"/mnt/SDCARD/" + "/Roms/"` both yield `"/mnt/SDCARD/Roms"`. A path
    /// that started absolute stays absolute.
    pub fn effective_transfer_path(&self, relative: &str) -> String {
        let prefix = self.transfer_path_prefix.trim_end_matches('/');
        let root = self.root_path.trim_matches('/');
        let is_absolute = self.transfer_path_prefix.starts_with('/');

        let mut path = if prefix.is_empty() {
            root.to_string()
        } else if root.is_empty() {
            prefix.to_string()
        } else {
            format!("{prefix}/{root}")
        };

        if !relative.is_empty() {
            path = format!("{}/{}", path, relative.trim_start_matches('/'));
        }

        if is_absolute && !path.starts_with('/') {
            path.insert(0, '/');
        }

        path
    }

    /// Device-side path for a companion image, from the path template.
    ///
    /// `None` when images are disabled or no template is configured. The
    /// template decides for itself whether the ROM root is part of the
    /// path: some devices keep images in an unrelated absolute-style
    /// location (e.g. muOS catalogues).
    pub fn image_path(&self, system_slug: &str, rom_filename: &str) -> Option<String> {
        if !self.include_images || self.image_path_template.is_empty() {
            return None;
        }

        let system_folder = self.system_folder(system_slug);
        let rom_name = Path::new(rom_filename)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| rom_filename.to_string());

        Some(
            self.image_path_template
                .replace("{root_path}", self.root_path.trim_matches('/'))
                .replace("{system}", &system_folder)
                .replace("{romname}", &rom_name)
                .replace("{romname_ext}", rom_filename),
        )
    }

    /// Full remote path for a companion image including the mount prefix.
    ///
    /// Only the prefix is prepended, not `root_path`; the template already
    /// chose whether to include the root.
    pub fn effective_image_path(&self, system_slug: &str, rom_filename: &str) -> Option<String> {
        let image_path = self.image_path(system_slug, rom_filename)?;
        let prefix = self.transfer_path_prefix.trim_end_matches('/');
        if prefix.is_empty() {
            Some(image_path)
        } else {
            Some(format!("{prefix}/{}", image_path.trim_start_matches('/')))
        }
    }
}

/// Replaces characters that are unsafe in device filesystem names.
pub fn sanitize_filename(name: &str) -> String {
    name.replace(['<', '>', ':', '"', '|', '?', '*'], "_")
}
