//! Live registry backend.
//!
//! Key and value I/O goes through `winreg`; ownership and DACL changes use
//! the raw security APIs from `windows-sys`.

use std::ffi::c_void;
use std::io;
use std::ptr;

use winreg::enums::{
    RegType, HKEY_CLASSES_ROOT, HKEY_CURRENT_CONFIG, HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE,
    HKEY_USERS, KEY_ALL_ACCESS, KEY_READ, KEY_WRITE,
};
use winreg::{RegKey, RegValue};

use windows_sys::Win32::Foundation::{CloseHandle, LocalFree, ERROR_SUCCESS, HANDLE};
use windows_sys::Win32::Security::Authorization::{
    SetEntriesInAclW, SetNamedSecurityInfoW, EXPLICIT_ACCESS_W, NO_MULTIPLE_TRUSTEE,
    SET_ACCESS, SE_REGISTRY_KEY, TRUSTEE_IS_SID, TRUSTEE_IS_WELL_KNOWN_GROUP, TRUSTEE_W,
};
use windows_sys::Win32::Security::{
    AdjustTokenPrivileges, CreateWellKnownSid, LookupPrivilegeValueW, WinBuiltinAdministratorsSid,
    ACL, DACL_SECURITY_INFORMATION, LUID_AND_ATTRIBUTES, OWNER_SECURITY_INFORMATION,
    SECURITY_MAX_SID_SIZE, SE_PRIVILEGE_ENABLED, SUB_CONTAINERS_AND_OBJECTS_INHERIT,
    TOKEN_ADJUST_PRIVILEGES, TOKEN_PRIVILEGES, TOKEN_QUERY,
};
use windows_sys::Win32::System::Threading::{GetCurrentProcess, OpenProcessToken};

use crate::error::{StoreError, StoreResult};
use crate::hive::key::{KeyPath, RootKey};
use crate::hive::store::{Access, AccessControl, KeyHandle, KeyStore};
use crate::hive::value::{Value, ValueData};

const ERROR_FILE_NOT_FOUND: i32 = 2;
const ERROR_ACCESS_DENIED: i32 = 5;
const ERROR_KEY_DELETED: i32 = 1018;
const ERROR_SHARING_VIOLATION: i32 = 32;

const FORCE_PRIVILEGES: [&str; 3] = [
    "SeTakeOwnershipPrivilege",
    "SeRestorePrivilege",
    "SeBackupPrivilege",
];

/// The registry of the running system.
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsRegistry;

impl WindowsRegistry {
    pub fn new() -> Self {
        Self
    }
}

fn predef(root: RootKey) -> RegKey {
    RegKey::predef(match root {
        RootKey::ClassesRoot => HKEY_CLASSES_ROOT,
        RootKey::CurrentUser => HKEY_CURRENT_USER,
        RootKey::LocalMachine => HKEY_LOCAL_MACHINE,
        RootKey::Users => HKEY_USERS,
        RootKey::CurrentConfig => HKEY_CURRENT_CONFIG,
    })
}

fn map_io(err: io::Error, path: &str) -> StoreError {
    match err.raw_os_error() {
        Some(ERROR_FILE_NOT_FOUND) | Some(ERROR_KEY_DELETED) => StoreError::NotFound(path.to_string()),
        Some(ERROR_ACCESS_DENIED) => StoreError::AccessDenied(path.to_string()),
        Some(ERROR_SHARING_VIOLATION) => StoreError::InUse(path.to_string()),
        Some(code) => StoreError::Os {
            code,
            path: path.to_string(),
        },
        None => StoreError::Os {
            code: -1,
            path: path.to_string(),
        },
    }
}

impl KeyStore for WindowsRegistry {
    fn open(&self, root: RootKey, path: &str, access: Access) -> StoreResult<Box<dyn KeyHandle + '_>> {
        let key_path = KeyPath::new(root, path);
        let flags = match access {
            Access::Read => KEY_READ,
            Access::Write => KEY_READ | KEY_WRITE,
            Access::Full => KEY_ALL_ACCESS,
        };
        let key = predef(root)
            .open_subkey_with_flags(&key_path.subkey, flags)
            .map_err(|e| map_io(e, &key_path.to_string()))?;
        Ok(Box::new(WindowsHandle { key, path: key_path }))
    }

    fn create(&self, root: RootKey, path: &str) -> StoreResult<Box<dyn KeyHandle + '_>> {
        let key_path = KeyPath::new(root, path);
        let (key, _) = predef(root)
            .create_subkey(&key_path.subkey)
            .map_err(|e| map_io(e, &key_path.to_string()))?;
        Ok(Box::new(WindowsHandle { key, path: key_path }))
    }

    fn access_control(&self) -> Option<&dyn AccessControl> {
        Some(self)
    }
}

struct WindowsHandle {
    key: RegKey,
    path: KeyPath,
}

impl WindowsHandle {
    fn err(&self, e: io::Error) -> StoreError {
        map_io(e, &self.path.to_string())
    }
}

impl KeyHandle for WindowsHandle {
    fn path(&self) -> &KeyPath {
        &self.path
    }

    fn subkey_names(&self) -> StoreResult<Vec<String>> {
        self.key
            .enum_keys()
            .collect::<io::Result<Vec<_>>>()
            .map_err(|e| self.err(e))
    }

    fn values(&self) -> StoreResult<Vec<Value>> {
        self.key
            .enum_values()
            .map(|entry| entry.map(|(name, raw)| Value::new(name, decode(&raw))))
            .collect::<io::Result<Vec<_>>>()
            .map_err(|e| self.err(e))
    }

    fn value(&self, name: &str) -> Option<ValueData> {
        self.key.get_raw_value(name).ok().map(|raw| decode(&raw))
    }

    fn subkey_count(&self) -> StoreResult<usize> {
        self.key
            .query_info()
            .map(|info| info.sub_keys as usize)
            .map_err(|e| self.err(e))
    }

    fn value_count(&self) -> StoreResult<usize> {
        self.key
            .query_info()
            .map(|info| info.values as usize)
            .map_err(|e| self.err(e))
    }

    fn set_value(&self, name: &str, data: &ValueData) -> StoreResult<()> {
        self.key
            .set_raw_value(name, &encode(data))
            .map_err(|e| self.err(e))
    }

    fn delete_value(&self, name: &str) -> StoreResult<()> {
        self.key.delete_value(name).map_err(|e| self.err(e))
    }

    fn delete_subkey(&self, name: &str) -> StoreResult<()> {
        let child = self.path.join(name);
        let children = self
            .key
            .open_subkey_with_flags(name, KEY_READ)
            .and_then(|k| k.query_info())
            .map_err(|e| map_io(e, &child.to_string()))?
            .sub_keys;
        if children > 0 {
            return Err(StoreError::HasChildren(child.to_string()));
        }
        self.key
            .delete_subkey(name)
            .map_err(|e| map_io(e, &child.to_string()))
    }

    fn delete_subkey_tree(&self, name: &str) -> StoreResult<()> {
        let child = self.path.join(name);
        self.key
            .delete_subkey_all(name)
            .map_err(|e| map_io(e, &child.to_string()))
    }
}

fn utf16_units(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

fn decode_string(bytes: &[u8]) -> String {
    let units = utf16_units(bytes);
    let end = units.iter().position(|&u| u == 0).unwrap_or(units.len());
    String::from_utf16_lossy(&units[..end])
}

fn decode(raw: &RegValue) -> ValueData {
    match raw.vtype {
        RegType::REG_NONE => ValueData::None,
        RegType::REG_SZ => ValueData::String(decode_string(&raw.bytes)),
        RegType::REG_EXPAND_SZ => ValueData::ExpandString(decode_string(&raw.bytes)),
        RegType::REG_MULTI_SZ => ValueData::MultiString(
            utf16_units(&raw.bytes)
                .split(|&u| u == 0)
                .filter(|part| !part.is_empty())
                .map(String::from_utf16_lossy)
                .collect(),
        ),
        RegType::REG_DWORD if raw.bytes.len() >= 4 => ValueData::DWord(u32::from_le_bytes([
            raw.bytes[0],
            raw.bytes[1],
            raw.bytes[2],
            raw.bytes[3],
        ])),
        RegType::REG_QWORD if raw.bytes.len() >= 8 => {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&raw.bytes[..8]);
            ValueData::QWord(u64::from_le_bytes(buf))
        }
        _ => ValueData::Binary(raw.bytes.clone()),
    }
}

fn encode_units(text: &str, out: &mut Vec<u8>) {
    for unit in text.encode_utf16().chain(std::iter::once(0)) {
        out.extend_from_slice(&unit.to_le_bytes());
    }
}

fn encode(data: &ValueData) -> RegValue {
    let mut bytes = Vec::new();
    let vtype = match data {
        ValueData::None => RegType::REG_NONE,
        ValueData::String(s) => {
            encode_units(s, &mut bytes);
            RegType::REG_SZ
        }
        ValueData::ExpandString(s) => {
            encode_units(s, &mut bytes);
            RegType::REG_EXPAND_SZ
        }
        ValueData::MultiString(items) => {
            for item in items {
                encode_units(item, &mut bytes);
            }
            bytes.extend_from_slice(&[0, 0]);
            RegType::REG_MULTI_SZ
        }
        ValueData::Binary(b) => {
            bytes.extend_from_slice(b);
            RegType::REG_BINARY
        }
        ValueData::DWord(n) => {
            bytes.extend_from_slice(&n.to_le_bytes());
            RegType::REG_DWORD
        }
        ValueData::QWord(n) => {
            bytes.extend_from_slice(&n.to_le_bytes());
            RegType::REG_QWORD
        }
    };
    RegValue { bytes, vtype }
}

fn wide(text: &str) -> Vec<u16> {
    text.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Object name understood by the named-security APIs, e.g. `MACHINE\SOFTWARE\X`.
fn security_object_name(root: RootKey, path: &str) -> StoreResult<Vec<u16>> {
    let prefix = match root {
        RootKey::ClassesRoot => "CLASSES_ROOT",
        RootKey::CurrentUser => "CURRENT_USER",
        RootKey::LocalMachine => "MACHINE",
        RootKey::Users => "USERS",
        RootKey::CurrentConfig => {
            return Err(StoreError::Unsupported(KeyPath::new(root, path).to_string()))
        }
    };
    let path = KeyPath::new(root, path);
    if path.subkey.is_empty() {
        Ok(wide(prefix))
    } else {
        Ok(wide(&format!("{}\\{}", prefix, path.subkey)))
    }
}

/// Enable the take-ownership, restore and backup privileges on the process token.
///
/// Each privilege is enabled independently; returns how many succeeded.
#[allow(unsafe_code)]
pub fn enable_force_privileges() -> usize {
    let mut token: HANDLE = ptr::null_mut();
    let opened = unsafe {
        OpenProcessToken(
            GetCurrentProcess(),
            TOKEN_ADJUST_PRIVILEGES | TOKEN_QUERY,
            &mut token,
        )
    };
    if opened == 0 {
        return 0;
    }

    let mut enabled = 0;
    for name in FORCE_PRIVILEGES {
        let wname = wide(name);
        let mut privileges = TOKEN_PRIVILEGES {
            PrivilegeCount: 1,
            Privileges: [LUID_AND_ATTRIBUTES {
                Luid: unsafe { std::mem::zeroed() },
                Attributes: SE_PRIVILEGE_ENABLED,
            }],
        };
        let found = unsafe {
            LookupPrivilegeValueW(ptr::null(), wname.as_ptr(), &mut privileges.Privileges[0].Luid)
        };
        if found == 0 {
            tracing::debug!("privilege {} unknown", name);
            continue;
        }
        let adjusted = unsafe {
            AdjustTokenPrivileges(token, 0, &privileges, 0, ptr::null_mut(), ptr::null_mut())
        };
        if adjusted != 0 && io::Error::last_os_error().raw_os_error() == Some(0) {
            enabled += 1;
        } else {
            tracing::debug!("privilege {} not held", name);
        }
    }

    unsafe { CloseHandle(token) };
    enabled
}

fn administrators_sid() -> StoreResult<Vec<u8>> {
    let mut sid = vec![0u8; SECURITY_MAX_SID_SIZE as usize];
    let mut size = SECURITY_MAX_SID_SIZE as u32;
    #[allow(unsafe_code)]
    let ok = unsafe {
        CreateWellKnownSid(
            WinBuiltinAdministratorsSid,
            ptr::null_mut(),
            sid.as_mut_ptr() as *mut c_void,
            &mut size,
        )
    };
    if ok == 0 {
        return Err(StoreError::Os {
            code: io::Error::last_os_error().raw_os_error().unwrap_or(-1),
            path: "BUILTIN\\Administrators".to_string(),
        });
    }
    sid.truncate(size as usize);
    Ok(sid)
}

fn check_win32(code: u32, root: RootKey, path: &str) -> StoreResult<()> {
    if code == ERROR_SUCCESS {
        return Ok(());
    }
    let display = KeyPath::new(root, path).to_string();
    Err(match code as i32 {
        ERROR_FILE_NOT_FOUND => StoreError::NotFound(display),
        ERROR_ACCESS_DENIED => StoreError::AccessDenied(display),
        other => StoreError::Os {
            code: other,
            path: display,
        },
    })
}

impl AccessControl for WindowsRegistry {
    #[allow(unsafe_code)]
    fn take_ownership(&self, root: RootKey, path: &str) -> StoreResult<()> {
        enable_force_privileges();
        let name = security_object_name(root, path)?;
        let mut sid = administrators_sid()?;

        let code = unsafe {
            SetNamedSecurityInfoW(
                name.as_ptr(),
                SE_REGISTRY_KEY,
                OWNER_SECURITY_INFORMATION,
                sid.as_mut_ptr() as *mut c_void,
                ptr::null_mut(),
                ptr::null(),
                ptr::null(),
            )
        };
        check_win32(code, root, path)
    }

    #[allow(unsafe_code)]
    fn grant_full_control(&self, root: RootKey, path: &str) -> StoreResult<()> {
        let name = security_object_name(root, path)?;
        let mut sid = administrators_sid()?;

        let access = EXPLICIT_ACCESS_W {
            grfAccessPermissions: KEY_ALL_ACCESS,
            grfAccessMode: SET_ACCESS,
            grfInheritance: SUB_CONTAINERS_AND_OBJECTS_INHERIT,
            Trustee: TRUSTEE_W {
                pMultipleTrustee: ptr::null_mut(),
                MultipleTrusteeOperation: NO_MULTIPLE_TRUSTEE,
                TrusteeForm: TRUSTEE_IS_SID,
                TrusteeType: TRUSTEE_IS_WELL_KNOWN_GROUP,
                ptstrName: sid.as_mut_ptr() as *mut u16,
            },
        };

        let mut acl: *mut ACL = ptr::null_mut();
        let code = unsafe { SetEntriesInAclW(1, &access, ptr::null(), &mut acl) };
        check_win32(code, root, path)?;

        let code = unsafe {
            SetNamedSecurityInfoW(
                name.as_ptr(),
                SE_REGISTRY_KEY,
                DACL_SECURITY_INFORMATION,
                ptr::null_mut(),
                ptr::null_mut(),
                acl,
                ptr::null(),
            )
        };
        unsafe { LocalFree(acl as *mut c_void) };
        check_win32(code, root, path)
    }
}
