//! `<scheme>:<backend>:<fsname>[#{path|[id]}]` URI parsing and backend
//! resolution.

use anyhow::{anyhow, bail, Context, Result};
use rbh_core::backend::registry::builtin_info;
use rbh_core::backend::{Backend, BranchRoot, Capability};
use rbh_core::id::{BackendTag, Id};
use rbh_core::target::MemoryTarget;

/// A parsed `rbh:` URI.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Uri {
    /// The plugin name (e.g. `memory`, `posix`).
    pub backend: String,
    /// The backend-specific root (mount point, database name, bucket).
    pub fsname: String,
    /// An optional sub-tree selector carried in the fragment.
    pub fragment: Option<Fragment>,
}

/// The optional `#...` fragment selecting a sub-tree.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Fragment {
    /// A path relative to the backend's root.
    Path(String),
    /// An id, written `[tag:hex]` to disambiguate from a path.
    Id(Id),
}

impl std::str::FromStr for Uri {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (scheme, rest) = s.split_once(':').context("missing scheme")?;
        if scheme != "rbh" {
            bail!("unsupported URI scheme {scheme:?}, expected \"rbh\"");
        }
        let (backend, rest) = rest.split_once(':').context("missing backend name")?;
        let (fsname, fragment) = match rest.split_once('#') {
            Some((fsname, fragment)) => (fsname, Some(parse_fragment(fragment)?)),
            None => (rest, None),
        };
        if backend.is_empty() || fsname.is_empty() {
            bail!("backend name and fsname must be non-empty");
        }
        Ok(Uri {
            backend: backend.to_string(),
            fsname: fsname.to_string(),
            fragment,
        })
    }
}

fn parse_fragment(fragment: &str) -> Result<Fragment> {
    if let Some(inner) = fragment.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        let (tag, hex) = inner.split_once(':').context("id fragment must be tag:hex")?;
        let tag = match tag {
            "posix" => BackendTag::Posix,
            "mpi" => BackendTag::Mpi,
            "s3" => BackendTag::S3,
            "target" => BackendTag::TargetStore,
            other => bail!("unknown backend tag {other:?} in id fragment"),
        };
        let bytes = decode_hex(hex)?;
        Ok(Fragment::Id(Id::new(tag, bytes)))
    } else {
        Ok(Fragment::Path(fragment.to_string()))
    }
}

fn decode_hex(hex: &str) -> Result<Vec<u8>> {
    if hex.len() % 2 != 0 {
        bail!("odd-length hex string {hex:?}");
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|e| anyhow!(e)))
        .collect()
}

/// Resolve a [`Uri`] into a live backend handle.
///
/// Only the `memory` plugin is built into this reference driver: it
/// constructs a fresh, empty [`MemoryTarget`] scoped to the lifetime of
/// the current process (there is no on-disk persistence behind it;
/// storage medium is left to the backend). Real deployments resolve
/// `backend` through [`rbh_core::backend::registry::PluginRegistry`]
/// against a shared-object plugin discovered by name instead.
pub fn open_target(uri: &Uri) -> Result<Box<dyn Backend>> {
    let target: Box<dyn Backend> = match uri.backend.as_str() {
        "memory" => {
            let root_id = Id::new(BackendTag::TargetStore, uri.fsname.as_bytes().to_vec());
            Box::new(MemoryTarget::new(root_id))
        }
        other => bail!(
            "unknown backend {other:?}; only \"memory\" is built into this driver, \
             load other plugins via the shared-object naming convention"
        ),
    };

    match &uri.fragment {
        None => Ok(target),
        Some(Fragment::Id(id)) => target.branch(BranchRoot::Id(id.clone())),
        Some(Fragment::Path(path)) => target.branch(BranchRoot::Path(path.clone().into())),
    }
}

/// Informational helper used by `rbh-info`: the [`rbh_core::backend::PluginInfo`]
/// a freshly-resolved `memory` backend would advertise, without requiring
/// a live instance.
pub fn builtin_memory_info() -> rbh_core::backend::PluginInfo {
    builtin_info(
        "memory",
        Capability::FILTER | Capability::UPDATE | Capability::BRANCH | Capability::SYNC,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_uri() {
        let uri: Uri = "rbh:memory:test".parse().unwrap();
        assert_eq!(uri.backend, "memory");
        assert_eq!(uri.fsname, "test");
        assert_eq!(uri.fragment, None);
    }

    #[test]
    fn parses_path_fragment() {
        let uri: Uri = "rbh:memory:test#/a/b".parse().unwrap();
        assert_eq!(uri.fragment, Some(Fragment::Path("/a/b".to_string())));
    }

    #[test]
    fn parses_id_fragment() {
        let uri: Uri = "rbh:memory:test#[target:0a0b]".parse().unwrap();
        match uri.fragment {
            Some(Fragment::Id(id)) => {
                assert_eq!(id.tag(), BackendTag::TargetStore);
                assert_eq!(id.as_bytes(), &[0x0a, 0x0b]);
            }
            other => panic!("expected id fragment, got {other:?}"),
        }
    }

    #[test]
    fn rejects_wrong_scheme() {
        assert!("nope:memory:test".parse::<Uri>().is_err());
    }
}
