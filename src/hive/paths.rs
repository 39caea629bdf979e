//! Resolving file paths recorded in value data.
//!
//! Values reference files in several shapes: quoted, with trailing
//! arguments, with `%VAR%` placeholders, or with the `\SystemRoot\` prefix
//! services use. Everything here is pure apart from the existence probes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Extensions that terminate the path part of a command line.
const EXECUTABLE_EXTENSIONS: &[&str] = &[".exe", ".dll", ".ocx", ".sys", ".cpl", ".scr"];

const SYSTEM_ROOT_PREFIX: &str = "\\SystemRoot\\";

const DEFAULT_WINDOWS_DIR: &str = "C:\\Windows";

/// Expands and probes file paths against an injected environment.
#[derive(Debug, Clone, Default)]
pub struct PathResolver {
    /// Upper-cased variable name to value.
    vars: HashMap<String, String>,
}

impl PathResolver {
    /// Resolver over the current process environment.
    pub fn from_env() -> Self {
        Self::with_vars(std::env::vars())
    }

    pub fn with_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.as_ref().to_uppercase(), v.into()))
                .collect(),
        }
    }

    pub fn set_var(&mut self, name: &str, value: impl Into<String>) {
        self.vars.insert(name.to_uppercase(), value.into());
    }

    pub fn var(&self, name: &str) -> Option<&str> {
        self.vars.get(&name.to_uppercase()).map(String::as_str)
    }

    /// Replace `%NAME%` references. Unknown names are left as written.
    pub fn expand_env(&self, input: &str) -> String {
        let mut out = String::with_capacity(input.len());
        let mut rest = input;

        while let Some(start) = rest.find('%') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];

            match after.find('%') {
                Some(end) => {
                    let name = &after[..end];
                    match self.var(name) {
                        Some(value) if !name.is_empty() => out.push_str(value),
                        _ => {
                            out.push('%');
                            out.push_str(name);
                            out.push('%');
                        }
                    }
                    rest = &after[end + 1..];
                }
                None => {
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }

        out.push_str(rest);
        out
    }

    /// Windows directory taken from `SystemRoot`, then `windir`.
    pub fn windows_dir(&self) -> String {
        self.var("SystemRoot")
            .or_else(|| self.var("windir"))
            .unwrap_or(DEFAULT_WINDOWS_DIR)
            .to_string()
    }

    /// Rewrite a leading `\SystemRoot\` into the Windows directory.
    pub fn expand_system_root(&self, input: &str) -> String {
        match strip_prefix_ignore_case(input, SYSTEM_ROOT_PREFIX) {
            Some(rest) => format!("{}\\{}", self.windows_dir(), rest),
            None => input.to_string(),
        }
    }

    /// Pull the file path out of a command line.
    ///
    /// Quoted paths win; otherwise the text up to the first known
    /// executable extension; otherwise the first token when that exists on
    /// disk; otherwise the whole trimmed string.
    pub fn extract_file_path(&self, value: &str) -> Option<String> {
        let value = value.trim_matches([' ', '\t']);
        if value.is_empty() {
            return None;
        }

        if let Some(inner) = value.strip_prefix('"') {
            if let Some(end) = inner.find('"') {
                return Some(inner[..end].to_string());
            }
        }

        if let Some(end) = executable_end(value) {
            return Some(value[..end].to_string());
        }

        if let Some((first, _)) = value.split_once(' ') {
            if self.exists(first) {
                return Some(first.to_string());
            }
        }

        Some(value.to_string())
    }

    /// Extract the file path from a command line and expand it.
    pub fn resolve_command(&self, value: &str) -> Option<String> {
        self.extract_file_path(value)
            .map(|path| self.expand_env(&path))
            .filter(|path| !path.is_empty())
    }

    /// Unquote and expand a plain path value.
    pub fn resolve_path(&self, value: &str) -> String {
        self.expand_env(unquote(value.trim()))
    }

    pub fn exists(&self, path: &str) -> bool {
        self.probe(path, |p| p.exists())
    }

    pub fn file_exists(&self, path: &str) -> bool {
        self.probe(path, |p| p.is_file())
    }

    pub fn dir_exists(&self, path: &str) -> bool {
        self.probe(path, |p| p.is_dir())
    }

    /// Whether a file referenced by a command line exists.
    ///
    /// Bare file names are looked up in the system directory and then the
    /// Windows directory, the way the loader searches for them.
    pub fn target_exists(&self, path: &str) -> bool {
        let expanded = self.expand_env(path.trim());
        if is_bare_name(&expanded) && !has_placeholder(&expanded) {
            let windir = native_path(&self.windows_dir());
            return !expanded.is_empty()
                && (windir.join("System32").join(&expanded).exists() || windir.join(&expanded).exists());
        }
        self.exists(&expanded)
    }

    /// Paths still holding `%NAME%` after expansion cannot be checked and
    /// count as present.
    fn probe(&self, path: &str, check: impl Fn(&Path) -> bool) -> bool {
        if path.trim().is_empty() {
            return false;
        }
        let expanded = self.expand_env(path);
        if has_placeholder(&expanded) {
            return true;
        }
        check(&native_path(&expanded))
    }
}

/// Paths recorded with backslashes, in the host's separator convention.
fn native_path(path: &str) -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(path)
    } else {
        PathBuf::from(path.replace('\\', "/"))
    }
}

/// A file name with no directory part.
pub fn is_bare_name(path: &str) -> bool {
    !path.contains(['\\', '/'])
}

/// `%NAME%` or a positional argument such as `%1` or `%*`.
fn has_placeholder(text: &str) -> bool {
    text.match_indices('%').any(|(pos, _)| {
        let rest = &text[pos + 1..];
        rest.starts_with(|c: char| c.is_ascii_digit() || c == '*')
            || rest.find('%').is_some_and(|end| end > 0)
    })
}

/// Strip one pair of surrounding double quotes; an unterminated quote
/// keeps everything after it.
pub fn unquote(value: &str) -> &str {
    match value.strip_prefix('"') {
        Some(inner) => match inner.find('"') {
            Some(end) => &inner[..end],
            None => inner,
        },
        None => value,
    }
}

fn strip_prefix_ignore_case<'a>(input: &'a str, prefix: &str) -> Option<&'a str> {
    let head = input.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &input[prefix.len()..])
}

/// Byte offset just past the first executable extension that ends a token.
fn executable_end(value: &str) -> Option<usize> {
    let lower = value.to_ascii_lowercase();
    EXECUTABLE_EXTENSIONS
        .iter()
        .filter_map(|ext| {
            lower.match_indices(*ext).map(|(pos, _)| pos + ext.len()).find(|&end| {
                matches!(lower.as_bytes().get(end), None | Some(b' ' | b'"' | b',' | b'\t'))
            })
        })
        .min()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn resolver() -> PathResolver {
        PathResolver::with_vars([("SystemRoot", "C:\\Windows"), ("ProgramFiles", "C:\\Program Files")])
    }

    #[test]
    fn expands_known_variables_ignoring_case() {
        let r = resolver();
        assert_eq!(r.expand_env("%systemroot%\\notepad.exe"), "C:\\Windows\\notepad.exe");
        assert_eq!(r.expand_env("%PROGRAMFILES%\\A\\%SystemRoot%"), "C:\\Program Files\\A\\C:\\Windows");
    }

    #[test]
    fn leaves_unknown_and_unterminated_variables() {
        let r = resolver();
        assert_eq!(r.expand_env("%NOPE%\\x"), "%NOPE%\\x");
        assert_eq!(r.expand_env("100% done"), "100% done");
        assert_eq!(r.expand_env("%%"), "%%");
    }

    #[test]
    fn unquote_strips_one_pair() {
        assert_eq!(unquote("\"C:\\A B\\x.exe\" /s"), "C:\\A B\\x.exe");
        assert_eq!(unquote("\"C:\\open"), "C:\\open");
        assert_eq!(unquote("plain"), "plain");
    }

    #[test]
    fn extract_prefers_quoted_path() {
        let r = resolver();
        assert_eq!(
            r.extract_file_path("  \"C:\\Program Files\\App\\app.exe\" --minimized "),
            Some("C:\\Program Files\\App\\app.exe".to_string())
        );
    }

    #[test]
    fn extract_cuts_after_executable_extension() {
        let r = resolver();
        assert_eq!(
            r.extract_file_path("C:\\Program Files\\App\\app.EXE /background"),
            Some("C:\\Program Files\\App\\app.EXE".to_string())
        );
        assert_eq!(
            r.extract_file_path("C:\\tools\\app.executor\\run.exe -x"),
            Some("C:\\tools\\app.executor\\run.exe".to_string())
        );
    }

    #[test]
    fn extract_falls_back_to_existing_first_token() {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("launch.sh");
        fs::write(&script, "").unwrap();

        let r = resolver();
        let line = format!("{} --flag", script.display());
        assert_eq!(r.extract_file_path(&line), Some(script.display().to_string()));
        assert_eq!(r.extract_file_path("   "), None);
    }

    #[test]
    fn system_root_prefix_is_rewritten() {
        let r = resolver();
        assert_eq!(
            r.expand_system_root("\\SystemRoot\\System32\\svc.exe"),
            "C:\\Windows\\System32\\svc.exe"
        );
        assert_eq!(r.expand_system_root("C:\\x.exe"), "C:\\x.exe");
    }

    #[test]
    fn windows_dir_falls_back() {
        assert_eq!(PathResolver::default().windows_dir(), "C:\\Windows");
        let r = PathResolver::with_vars([("windir", "D:\\Win")]);
        assert_eq!(r.windows_dir(), "D:\\Win");
    }

    #[test]
    fn existence_probes_expand_variables() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.dll");
        fs::write(&file, "").unwrap();

        let r = PathResolver::with_vars([("APPDIR", dir.path().display().to_string())]);
        assert!(r.file_exists("%APPDIR%/a.dll"));
        assert!(!r.dir_exists("%APPDIR%/a.dll"));
        assert!(r.dir_exists("%APPDIR%"));
        assert!(!r.exists("%APPDIR%/missing.dll"));
        assert!(!r.exists(""));
    }

    #[test]
    fn unresolved_placeholders_count_as_present() {
        let r = resolver();
        assert!(r.exists("%UNSET_VAR%\\x.exe"));
        assert!(r.target_exists("%1"));
    }

    #[test]
    fn bare_names_search_windows_directories() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("System32")).unwrap();
        fs::write(dir.path().join("System32").join("msiexec.exe"), "").unwrap();

        let r = PathResolver::with_vars([("SystemRoot", dir.path().display().to_string())]);
        assert!(r.target_exists("msiexec.exe"));
        assert!(!r.target_exists("gone.exe"));
        assert!(is_bare_name("gone.exe"));
        assert!(!is_bare_name("C:\\gone.exe"));
    }

    #[cfg(not(windows))]
    #[test]
    fn backslash_separators_probe_on_unix_hosts() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("App")).unwrap();
        fs::write(dir.path().join("App").join("app.exe"), "").unwrap();

        let r = PathResolver::default();
        assert!(r.file_exists(&format!("{}\\App\\app.exe", dir.path().display())));
    }
}
