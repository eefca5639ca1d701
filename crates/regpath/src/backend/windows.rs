//! Win32 registry backend.
//!
//! Thin wrapper over the `Reg*W` functions from `windows-sys`. Names cross
//! the boundary as NUL-terminated UTF-16; return codes become
//! [`io::Error::from_raw_os_error`], so `ERROR_FILE_NOT_FOUND` surfaces as
//! `ErrorKind::NotFound`.

use chrono::{DateTime, Utc};
use std::io;
use std::ptr;

use windows_sys::Win32::Foundation::{
    ERROR_MORE_DATA, ERROR_SUCCESS, FILETIME, WIN32_ERROR,
};
use windows_sys::Win32::System::Registry::{
    HKEY, REG_OPTION_NON_VOLATILE, RegCloseKey, RegCreateKeyExW, RegDeleteKeyExW,
    RegDeleteValueW, RegEnumKeyExW, RegEnumValueW, RegOpenKeyExW, RegQueryInfoKeyW,
    RegQueryValueExW, RegSetValueExW,
};

use super::{KeyInfo, KeyParent, RawHandle, RawValue, RegistryBackend};
use crate::permission::RegistryView;

/// Longest key name the registry allows, plus the terminator.
const KEY_NAME_BUFFER: usize = 256;

/// Seconds between 1601-01-01 and 1970-01-01.
const FILETIME_UNIX_OFFSET: i64 = 11_644_473_600;

/// The machine's registry.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeRegistry;

impl NativeRegistry {
    pub fn new() -> Self {
        Self
    }
}

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

fn check(code: WIN32_ERROR) -> io::Result<()> {
    if code == ERROR_SUCCESS {
        Ok(())
    } else {
        Err(io::Error::from_raw_os_error(code as i32))
    }
}

fn hkey(handle: RawHandle) -> HKEY {
    handle.as_raw() as usize as HKEY
}

fn raw(hkey: HKEY) -> RawHandle {
    RawHandle::from_raw(hkey as usize as u64)
}

fn parent_hkey(parent: KeyParent) -> HKEY {
    match parent {
        // predefined handles are sign extended on 64-bit targets
        KeyParent::Root(root) => root.predefined_handle() as i32 as isize as HKEY,
        KeyParent::Key(handle) => hkey(handle),
    }
}

fn filetime_to_utc(ft: FILETIME) -> DateTime<Utc> {
    let ticks = ((ft.dwHighDateTime as u64) << 32) | ft.dwLowDateTime as u64;
    let secs = (ticks / 10_000_000) as i64 - FILETIME_UNIX_OFFSET;
    let nanos = ((ticks % 10_000_000) * 100) as u32;
    DateTime::from_timestamp(secs, nanos).unwrap_or_default()
}

fn from_wide(buf: &[u16], len: u32) -> String {
    String::from_utf16_lossy(&buf[..(len as usize).min(buf.len())])
}

impl RegistryBackend for NativeRegistry {
    fn open_key(&self, parent: KeyParent, path: &str, access: u32) -> io::Result<RawHandle> {
        let path = wide(path);
        let mut result: HKEY = ptr::null_mut();
        // SAFETY: `path` is NUL terminated and outlives the call; `result` is a valid out pointer.
        check(unsafe { RegOpenKeyExW(parent_hkey(parent), path.as_ptr(), 0, access, &mut result) })?;
        Ok(raw(result))
    }

    fn close_key(&self, handle: RawHandle) -> io::Result<()> {
        // SAFETY: the handle came from RegOpenKeyExW and is closed once.
        check(unsafe { RegCloseKey(hkey(handle)) })
    }

    fn create_key(&self, parent: RawHandle, name: &str, access: u32) -> io::Result<()> {
        let name = wide(name);
        let mut created: HKEY = ptr::null_mut();
        // SAFETY: all pointers are either null or point to live locals.
        check(unsafe {
            RegCreateKeyExW(
                hkey(parent),
                name.as_ptr(),
                0,
                ptr::null(),
                REG_OPTION_NON_VOLATILE,
                access,
                ptr::null(),
                &mut created,
                ptr::null_mut(),
            )
        })?;
        // only existence matters here
        self.close_key(raw(created))
    }

    fn delete_key(&self, parent: RawHandle, name: &str, access: u32) -> io::Result<()> {
        let name = wide(name);
        // SAFETY: `name` is NUL terminated and outlives the call.
        check(unsafe {
            RegDeleteKeyExW(hkey(parent), name.as_ptr(), access & RegistryView::MASK, 0)
        })
    }

    fn query_info(&self, handle: RawHandle) -> io::Result<KeyInfo> {
        let mut subkeys = 0u32;
        let mut values = 0u32;
        let mut written = FILETIME {
            dwLowDateTime: 0,
            dwHighDateTime: 0,
        };
        // SAFETY: unused outputs are null, used ones point to live locals.
        check(unsafe {
            RegQueryInfoKeyW(
                hkey(handle),
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null(),
                &mut subkeys,
                ptr::null_mut(),
                ptr::null_mut(),
                &mut values,
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
                &mut written,
            )
        })?;
        Ok(KeyInfo {
            subkey_count: subkeys,
            value_count: values,
            last_modified: filetime_to_utc(written),
        })
    }

    fn enum_key(&self, handle: RawHandle, index: u32) -> io::Result<String> {
        let mut name = [0u16; KEY_NAME_BUFFER];
        let mut len = name.len() as u32;
        // SAFETY: `len` holds the capacity of `name`.
        check(unsafe {
            RegEnumKeyExW(
                hkey(handle),
                index,
                name.as_mut_ptr(),
                &mut len,
                ptr::null(),
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
            )
        })?;
        Ok(from_wide(&name, len))
    }

    fn enum_value(&self, handle: RawHandle, index: u32) -> io::Result<RawValue> {
        // value names are at most 16383 characters
        let mut name = vec![0u16; 16_384];
        let mut data = vec![0u8; 256];
        loop {
            let mut name_len = name.len() as u32;
            let mut data_len = data.len() as u32;
            let mut type_code = 0u32;
            // SAFETY: lengths hold the capacities of their buffers.
            let code = unsafe {
                RegEnumValueW(
                    hkey(handle),
                    index,
                    name.as_mut_ptr(),
                    &mut name_len,
                    ptr::null(),
                    &mut type_code,
                    data.as_mut_ptr(),
                    &mut data_len,
                )
            };
            if code == ERROR_MORE_DATA {
                data.resize((data_len as usize).max(data.len() * 2), 0);
                continue;
            }
            check(code)?;
            data.truncate(data_len as usize);
            return Ok(RawValue {
                name: from_wide(&name, name_len),
                type_code,
                data,
            });
        }
    }

    fn query_value(&self, handle: RawHandle, name: &str) -> io::Result<RawValue> {
        let wide_name = wide(name);
        let mut data = vec![0u8; 256];
        loop {
            let mut data_len = data.len() as u32;
            let mut type_code = 0u32;
            // SAFETY: `data_len` holds the capacity of `data`.
            let code = unsafe {
                RegQueryValueExW(
                    hkey(handle),
                    wide_name.as_ptr(),
                    ptr::null(),
                    &mut type_code,
                    data.as_mut_ptr(),
                    &mut data_len,
                )
            };
            if code == ERROR_MORE_DATA {
                data.resize((data_len as usize).max(data.len() * 2), 0);
                continue;
            }
            check(code)?;
            data.truncate(data_len as usize);
            return Ok(RawValue {
                name: name.to_string(),
                type_code,
                data,
            });
        }
    }

    fn set_value(
        &self,
        handle: RawHandle,
        name: &str,
        type_code: u32,
        data: &[u8],
    ) -> io::Result<()> {
        let name = wide(name);
        let len = u32::try_from(data.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "value data too large"))?;
        // SAFETY: `data` is valid for `len` bytes.
        check(unsafe {
            RegSetValueExW(hkey(handle), name.as_ptr(), 0, type_code, data.as_ptr(), len)
        })
    }

    fn delete_value(&self, handle: RawHandle, name: &str) -> io::Result<()> {
        let name = wide(name);
        // SAFETY: `name` is NUL terminated and outlives the call.
        check(unsafe { RegDeleteValueW(hkey(handle), name.as_ptr()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filetime_epoch() {
        // 1970-01-01 in FILETIME ticks
        let ticks: u64 = 116_444_736_000_000_000;
        let ft = FILETIME {
            dwLowDateTime: ticks as u32,
            dwHighDateTime: (ticks >> 32) as u32,
        };
        assert_eq!(filetime_to_utc(ft), DateTime::<Utc>::default());
    }

    #[test]
    fn test_open_current_user() {
        let reg = NativeRegistry::new();
        let handle = reg
            .open_key(
                KeyParent::Root(crate::RootKey::CurrentUser),
                "",
                crate::KeyPermission::Read.bits(),
            )
            .unwrap();
        assert!(reg.query_info(handle).is_ok());
        reg.close_key(handle).unwrap();
    }
}
