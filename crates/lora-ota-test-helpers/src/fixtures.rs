//! Server-side frame builders and temporary device roots.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use lora_ota_protocol::{Message, MulticastKeyFields};
use lora_ota_update::delta::{DigestAlgorithm, compress_patch};
use lora_ota_update::text_patch;
use tempfile::TempDir;
use walkdir::WalkDir;

/// Multicast address used by the fixtures.
pub const TEST_MC_ADDRESS: &str = "26011bda";
/// Network session key used by the fixtures.
pub const TEST_NWK_KEY: &str = "2b7e151628aed2a6abf7158809cf4f3c";
/// Application session key used by the fixtures.
pub const TEST_APP_KEY: &str = "000102030405060708090a0b0c0d0e0f";

/// Builds the frames an update server would send.
pub struct ServerScript;

impl ServerScript {
    pub fn update_info(version: &str, epoch: i64) -> Vec<u8> {
        Message::UpdateInfo {
            version: version.to_string(),
            epoch: Some(epoch),
        }
        .encode()
    }

    pub fn multicast_key() -> Vec<u8> {
        Message::MulticastKey(MulticastKeyFields::new(
            TEST_MC_ADDRESS,
            TEST_NWK_KEY,
            TEST_APP_KEY,
        ))
        .encode()
    }

    pub fn no_multicast_key() -> Vec<u8> {
        Message::MulticastKey(MulticastKeyFields::default()).encode()
    }

    pub fn filename(name: &str) -> Vec<u8> {
        Message::Filename {
            name: name.to_string(),
        }
        .encode()
    }

    pub fn patch(payload: &[u8]) -> Vec<u8> {
        Message::Patch {
            payload: payload.to_vec(),
        }
        .encode()
    }

    /// Compress `patch_text` and split it into at most `fragments` PATCH
    /// frames.
    pub fn patch_fragments(patch_text: &str, fragments: usize) -> Vec<Vec<u8>> {
        let compressed = compress_patch(patch_text.as_bytes()).expect("zlib compression");
        let chunk = compressed.len().div_ceil(fragments.max(1)).max(1);
        compressed.chunks(chunk).map(Self::patch).collect()
    }

    pub fn checksum(digest: &str) -> Vec<u8> {
        Message::Checksum {
            digest: digest.to_string(),
        }
        .encode()
    }

    /// CHECKSUM frame carrying the SHA-1 of `patch_text`.
    pub fn checksum_for(patch_text: &str) -> Vec<u8> {
        Self::checksum(&DigestAlgorithm::Sha1.hex_digest(patch_text.as_bytes()))
    }

    pub fn delete_file(name: &str) -> Vec<u8> {
        Message::DeleteFile {
            name: name.to_string(),
        }
        .encode()
    }

    pub fn manifest(new: u32, updated: u32, deleted: u32) -> Vec<u8> {
        Message::Manifest {
            body: format!("{{\"new\":{new},\"update\":{updated},\"delete\":{deleted}}}"),
        }
        .encode()
    }

    /// FILENAME, PATCH fragments and CHECKSUM turning `old` into `new`.
    pub fn file_transfer(name: &str, old: &str, new: &str, fragments: usize) -> Vec<Vec<u8>> {
        let patch_text = text_patch::make_patch(old, new);
        let mut frames = vec![Self::filename(name)];
        frames.extend(Self::patch_fragments(&patch_text, fragments));
        frames.push(Self::checksum_for(&patch_text));
        frames
    }

    /// UPDATE_INFO then MULTICAST_KEY.
    pub fn negotiation(version: &str) -> Vec<Vec<u8>> {
        vec![Self::update_info(version, 1_700_000_000), Self::multicast_key()]
    }
}

/// A temporary device root.
pub struct DeviceRoot {
    dir: TempDir,
}

impl DeviceRoot {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("temp dir"),
        }
    }

    pub fn with_files(files: &[(&str, &str)]) -> Self {
        let root = Self::new();
        for (name, content) in files {
            root.write(name, content);
        }
        root
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn write(&self, name: &str, content: &str) {
        let path = self.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(path, content).expect("write fixture file");
    }

    pub fn read(&self, name: &str) -> Option<String> {
        fs::read_to_string(self.join(name)).ok()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.join(name).exists()
    }

    /// Every file below the root, by relative path, with its content.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        WalkDir::new(self.path())
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                let rel = e
                    .path()
                    .strip_prefix(self.path())
                    .expect("below root")
                    .to_string_lossy()
                    .replace('\\', "/");
                let content = fs::read_to_string(e.path()).unwrap_or_default();
                (rel, content)
            })
            .collect()
    }

    /// Relative paths of every `.bak`, `.del` and `.tmp` file.
    pub fn artifacts(&self) -> Vec<String> {
        self.snapshot()
            .into_keys()
            .filter(|name| {
                name.ends_with(".bak") || name.ends_with(".del") || name.ends_with(".tmp")
            })
            .collect()
    }
}

impl Default for DeviceRoot {
    fn default() -> Self {
        Self::new()
    }
}
