//! Transfer endpoints - `alias:path` resolution and local path preparation

use crate::config::HostConfig;
use crate::error::{Result, WeaveError};
use crate::events::OpKind;
use std::fs;
use std::io;
use std::path::Path;

/// One side of a sync/fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// As written by the task body
    pub spec: String,
    /// Host alias when the endpoint is remote
    pub alias: Option<String>,
    /// Argument handed to the mirror tool
    pub resolved: String,
}

impl Endpoint {
    /// Parse and resolve `spec`; unknown aliases are argument errors
    pub fn resolve(hosts: &HostConfig, spec: &str) -> Result<Self> {
        let Some((alias, path)) = split_host_path(spec) else {
            return Ok(Self {
                spec: spec.to_string(),
                alias: None,
                resolved: spec.to_string(),
            });
        };

        let target = hosts.resolve(alias)?;
        Ok(Self {
            spec: spec.to_string(),
            alias: Some(alias.to_string()),
            resolved: format!("{}:{}", target, path),
        })
    }

    pub fn is_remote(&self) -> bool {
        self.alias.is_some()
    }
}

/// Split `alias:path`. The alias may not contain a path separator, so local
/// paths such as `./a:b` stay local.
pub fn split_host_path(spec: &str) -> Option<(&str, &str)> {
    let (alias, path) = spec.split_once(':')?;
    if alias.is_empty() || path.is_empty() || alias.contains('/') {
        return None;
    }
    Some((alias, path))
}

/// Source argument for the mirror tool.
///
/// `sync` from an existing local directory copies its contents, so the
/// argument gets a trailing separator. `fetch` is passed through.
pub fn transfer_source(op: OpKind, src: &Endpoint) -> String {
    if op != OpKind::Sync || src.is_remote() || src.resolved.ends_with('/') {
        return src.resolved.clone();
    }
    if Path::new(&src.spec).is_dir() {
        format!("{}/", src.resolved)
    } else {
        src.resolved.clone()
    }
}

/// Create the local directory a destination needs before transfer.
///
/// A trailing separator names the directory itself; otherwise its parent is
/// created. Remote destinations are left alone.
pub fn ensure_local_dest(dst: &Endpoint) -> io::Result<()> {
    if dst.is_remote() || dst.resolved.is_empty() {
        return Ok(());
    }

    if dst.resolved.ends_with('/') {
        return create_dir_all(Path::new(&dst.resolved));
    }

    match Path::new(&dst.resolved).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => create_dir_all(parent),
        _ => Ok(()),
    }
}

#[cfg(unix)]
fn create_dir_all(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().recursive(true).mode(0o750).create(path)
}

#[cfg(not(unix))]
fn create_dir_all(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path)
}

/// Convert a preparation failure to an argument error message
pub(crate) fn dest_error(dst: &Endpoint, e: io::Error) -> WeaveError {
    WeaveError::Argument(format!("cannot create destination for {}: {}", dst.spec, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Host;

    fn hosts() -> HostConfig {
        HostConfig::new().with_host("web", Host::new("10.0.0.5", "deploy"))
    }

    #[test]
    fn test_split_host_path() {
        assert_eq!(split_host_path("web:/srv/app"), Some(("web", "/srv/app")));
        assert_eq!(split_host_path("/local/path"), None);
        assert_eq!(split_host_path(":/x"), None);
        assert_eq!(split_host_path("web:"), None);
        assert_eq!(split_host_path("./a:b"), None);
    }

    #[test]
    fn test_resolve_remote_endpoint() {
        let ep = Endpoint::resolve(&hosts(), "web:/srv/app").unwrap();
        assert_eq!(ep.alias.as_deref(), Some("web"));
        assert_eq!(ep.resolved, "deploy@10.0.0.5:/srv/app");
        assert!(ep.is_remote());
    }

    #[test]
    fn test_resolve_unknown_alias() {
        let err = Endpoint::resolve(&hosts(), "db:/var/lib").unwrap_err();
        assert!(matches!(err, WeaveError::Argument(_)));
    }

    #[test]
    fn test_sync_source_gets_trailing_separator_for_directories() {
        let dir = tempfile::tempdir().unwrap();
        let spec = dir.path().to_string_lossy().into_owned();
        let src = Endpoint::resolve(&hosts(), &spec).unwrap();

        assert_eq!(transfer_source(OpKind::Sync, &src), format!("{}/", spec));
        assert_eq!(transfer_source(OpKind::Fetch, &src), spec);

        let file = dir.path().join("a.txt");
        fs::write(&file, "x").unwrap();
        let file_src = Endpoint::resolve(&hosts(), &file.to_string_lossy()).unwrap();
        assert_eq!(transfer_source(OpKind::Sync, &file_src), file_src.resolved);
    }

    #[test]
    fn test_ensure_local_dest_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a/b/file.txt");
        let ep = Endpoint::resolve(&hosts(), &target.to_string_lossy()).unwrap();

        ensure_local_dest(&ep).unwrap();
        assert!(dir.path().join("a/b").is_dir());
        assert!(!target.exists());
    }

    #[test]
    fn test_ensure_local_dest_creates_directory_with_trailing_separator() {
        let dir = tempfile::tempdir().unwrap();
        let target = format!("{}/out/logs/", dir.path().display());
        let ep = Endpoint::resolve(&hosts(), &target).unwrap();

        ensure_local_dest(&ep).unwrap();
        assert!(dir.path().join("out/logs").is_dir());
    }

    #[test]
    fn test_ensure_local_dest_ignores_remote() {
        let ep = Endpoint::resolve(&hosts(), "web:/srv/new/dir/").unwrap();
        ensure_local_dest(&ep).unwrap();
        assert!(!Path::new("/srv/new/dir").exists());
    }
}
