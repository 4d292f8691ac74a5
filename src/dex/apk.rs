//! APK access: pulls `classes.dex` out of the ZIP container and scans the
//! binary `AndroidManifest.xml` just far enough to find the main activity
//! (the activity whose intent filter carries `android.intent.action.MAIN`).

use std::fs::File;
use std::io::Read;
use std::path::Path;

use zip::ZipArchive;

use crate::jvm::error::VmError;

pub struct Apk {
    pub classes_dex: Vec<u8>,
    pub main_activity: Option<String>,
}

impl Apk {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Apk, VmError> {
        let file = File::open(path.as_ref())?;
        let mut archive = ZipArchive::new(file)
            .map_err(|e| VmError::Malformed(format!("not a readable apk: {}", e)))?;

        let mut classes_dex = Vec::new();
        archive
            .by_name("classes.dex")
            .map_err(|_| VmError::Malformed("apk has no classes.dex".to_string()))?
            .read_to_end(&mut classes_dex)?;

        let main_activity = match archive.by_name("AndroidManifest.xml") {
            Ok(mut entry) => {
                let mut manifest = Vec::new();
                entry.read_to_end(&mut manifest)?;
                match find_main_activity(&manifest) {
                    Some(name) => Some(name),
                    None => {
                        warn!("no main activity found in manifest");
                        None
                    }
                }
            }
            Err(_) => None,
        };

        Ok(Apk {
            classes_dex,
            main_activity,
        })
    }
}

const CHUNK_STRING_POOL: u16 = 0x0001;
const CHUNK_START_ELEMENT: u16 = 0x0102;
const UTF8_FLAG: u32 = 0x0100;

fn u16_at(data: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_le_bytes([*data.get(at)?, *data.get(at + 1)?]))
}

fn u32_at(data: &[u8], at: usize) -> Option<u32> {
    Some(u32::from_le_bytes([
        *data.get(at)?,
        *data.get(at + 1)?,
        *data.get(at + 2)?,
        *data.get(at + 3)?,
    ]))
}

/// Decode the string pool chunk starting at `at`.
fn read_string_pool(data: &[u8], at: usize) -> Option<Vec<String>> {
    let count = u32_at(data, at + 8)? as usize;
    let flags = u32_at(data, at + 16)?;
    let strings_start = u32_at(data, at + 20)? as usize;
    let utf8 = flags & UTF8_FLAG != 0;

    let mut strings = Vec::with_capacity(count);
    for i in 0..count {
        let offset = u32_at(data, at + 28 + 4 * i)? as usize;
        let base = at + strings_start + offset;
        if utf8 {
            // u8 utf16-length, u8 byte-length (each with a high-bit
            // continuation we ignore for the short strings manifests hold)
            let mut pos = base + 1;
            let mut len = *data.get(pos)? as usize;
            if len & 0x80 != 0 {
                len = (len & 0x7f) << 8 | *data.get(pos + 1)? as usize;
                pos += 1;
            }
            pos += 1;
            let raw = data.get(pos..pos + len)?;
            strings.push(String::from_utf8_lossy(raw).into_owned());
        } else {
            let mut len = u16_at(data, base)? as usize;
            let mut pos = base + 2;
            if len & 0x8000 != 0 {
                len = (len & 0x7fff) << 16 | u16_at(data, pos)? as usize;
                pos += 2;
            }
            let mut units = Vec::with_capacity(len);
            for j in 0..len {
                units.push(u16_at(data, pos + 2 * j)?);
            }
            strings.push(String::from_utf16_lossy(&units));
        }
    }
    Some(strings)
}

/// Walk the manifest's element chunks looking for
/// `<activity android:name=...>` enclosing an intent filter with the MAIN
/// action.
fn find_main_activity(manifest: &[u8]) -> Option<String> {
    if u16_at(manifest, 0)? != 0x0003 {
        return None;
    }

    let mut strings: Vec<String> = Vec::new();
    let mut current_activity: Option<String> = None;

    let mut at = 8usize;
    while at + 8 <= manifest.len() {
        let chunk_type = u16_at(manifest, at)?;
        let chunk_size = u32_at(manifest, at + 4)? as usize;
        if chunk_size < 8 || at + chunk_size > manifest.len() {
            break;
        }

        match chunk_type {
            CHUNK_STRING_POOL => {
                strings = read_string_pool(manifest, at)?;
            }
            CHUNK_START_ELEMENT => {
                let name_idx = u32_at(manifest, at + 20)? as usize;
                let element = strings.get(name_idx).map(|s| s.as_str()).unwrap_or("");
                let attr_count = u16_at(manifest, at + 28)? as usize;

                let attr_value = |wanted: &str| -> Option<String> {
                    for i in 0..attr_count {
                        let attr_at = at + 36 + i * 20;
                        let attr_name = u32_at(manifest, attr_at + 4)? as usize;
                        if strings.get(attr_name).map(|s| s.as_str()) != Some(wanted) {
                            continue;
                        }
                        let raw = u32_at(manifest, attr_at + 8)?;
                        if raw != 0xffff_ffff {
                            return strings.get(raw as usize).cloned();
                        }
                    }
                    None
                };

                match element {
                    "activity" => current_activity = attr_value("name"),
                    "action" => {
                        if attr_value("name").as_deref() == Some("android.intent.action.MAIN") {
                            if let Some(activity) = &current_activity {
                                return Some(activity.clone());
                            }
                        }
                    }
                    _ => {}
                }
            }
            _ => {}
        }
        at += chunk_size;
    }
    None
}
