use itertools::Itertools;
use parking_lot::Mutex;
use treeline_core::SmallKeyHashMap;

use std::io;
use std::process;
use std::thread;
use std::time::Duration;

/// Remote storage reached by relative path. Failures are undifferentiated:
/// the retry policy treats a timeout and a permission error identically.
pub trait Endpoint: Send + Sync {
    fn put_subpath(&self, path: &str, data: &[u8]) -> io::Result<()>;
    fn get_subpath(&self, path: &str) -> io::Result<Vec<u8>>;
    /// Absolute form of `path`, for diagnostics.
    fn full_path(&self, path: &str) -> String;
}

/// Consecutive failed PUT attempts tolerated before giving up on the build.
pub const PUT_RETRIES: usize = 20;

/// PUT with linear-backoff retry.
///
/// A chunk that cannot be durably persisted invalidates the whole tree's
/// consistency guarantee, so exhausting the retry budget terminates the
/// process rather than returning an error a caller could ignore.
pub fn ensure_put(endpoint: &dyn Endpoint, path: &str, data: &[u8]) {
    let mut retries = 0;

    loop {
        let err = match endpoint.put_subpath(path, data) {
            Ok(()) => return,
            Err(err) => err,
        };

        retries += 1;
        if retries < PUT_RETRIES {
            thread::sleep(Duration::from_secs(retries as u64));
            log::warn!(
                "failed PUT attempt {} for {}: {}",
                retries,
                endpoint.full_path(path),
                err
            );
        } else {
            log::error!(
                "failed to PUT {}: persistent failure; \
                 this is a non-recoverable error - exiting",
                endpoint.full_path(path)
            );
            process::exit(1);
        }
    }
}

/// In-memory endpoint, mostly for tests and tooling doubles.
#[derive(Default)]
pub struct MemoryEndpoint {
    objects: Mutex<SmallKeyHashMap<String, Vec<u8>>>,
}

impl MemoryEndpoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.objects.lock().contains_key(path)
    }

    /// Every stored path, sorted.
    pub fn paths(&self) -> Vec<String> {
        self.objects.lock().keys().cloned().sorted().collect()
    }
}

impl Endpoint for MemoryEndpoint {
    fn put_subpath(&self, path: &str, data: &[u8]) -> io::Result<()> {
        self.objects.lock().insert(path.to_owned(), data.to_vec());
        Ok(())
    }

    fn get_subpath(&self, path: &str) -> io::Result<Vec<u8>> {
        self.objects
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_owned()))
    }

    fn full_path(&self, path: &str) -> String {
        format!("memory://{}", path)
    }
}

/// Cold storage in a [`sled::Tree`], one blob per path.
pub struct SledEndpoint {
    name: String,
    tree: sled::Tree,
}

impl SledEndpoint {
    pub fn open(db: &sled::Db, name: &str) -> Result<Self, sled::Error> {
        Ok(Self {
            name: name.to_owned(),
            tree: db.open_tree(name)?,
        })
    }
}

fn sled_io(err: sled::Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err)
}

impl Endpoint for SledEndpoint {
    fn put_subpath(&self, path: &str, data: &[u8]) -> io::Result<()> {
        self.tree.insert(path, data).map_err(sled_io)?;
        self.tree.flush().map_err(sled_io)?;
        Ok(())
    }

    fn get_subpath(&self, path: &str) -> io::Result<Vec<u8>> {
        self.tree
            .get(path)
            .map_err(sled_io)?
            .map(|ivec| ivec.to_vec())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_owned()))
    }

    fn full_path(&self, path: &str) -> String {
        format!("sled://{}/{}", self.name, path)
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails the first `failures` puts, then delegates.
    pub(crate) struct FlakyEndpoint {
        inner: MemoryEndpoint,
        remaining: AtomicUsize,
        attempts: AtomicUsize,
    }

    impl FlakyEndpoint {
        pub(crate) fn new(failures: usize) -> Self {
            Self {
                inner: MemoryEndpoint::new(),
                remaining: AtomicUsize::new(failures),
                attempts: AtomicUsize::new(0),
            }
        }

        pub(crate) fn attempts(&self) -> usize {
            self.attempts.load(Ordering::Relaxed)
        }

        pub(crate) fn inner(&self) -> &MemoryEndpoint {
            &self.inner
        }
    }

    impl Endpoint for FlakyEndpoint {
        fn put_subpath(&self, path: &str, data: &[u8]) -> io::Result<()> {
            self.attempts.fetch_add(1, Ordering::Relaxed);
            let remaining = self.remaining.load(Ordering::Relaxed);
            if remaining > 0 {
                self.remaining.store(remaining - 1, Ordering::Relaxed);
                return Err(io::Error::new(io::ErrorKind::Other, "simulated outage"));
            }
            self.inner.put_subpath(path, data)
        }

        fn get_subpath(&self, path: &str) -> io::Result<Vec<u8>> {
            self.inner.get_subpath(path)
        }

        fn full_path(&self, path: &str) -> String {
            self.inner.full_path(path)
        }
    }

    #[test]
    fn memory_round_trip() {
        let endpoint = MemoryEndpoint::new();
        endpoint.put_subpath("37449", &[1, 2, 3]).unwrap();
        endpoint.put_subpath("1", &[9]).unwrap();

        assert_eq!(endpoint.get_subpath("37449").unwrap(), vec![1, 2, 3]);
        assert_eq!(endpoint.paths(), vec!["1".to_owned(), "37449".to_owned()]);
        assert!(endpoint.get_subpath("missing").is_err());
    }

    #[test]
    fn sled_round_trip() {
        let db = sled::Config::default().temporary(true).open().unwrap();
        let endpoint = SledEndpoint::open(&db, "cold").unwrap();

        endpoint.put_subpath("299593", &[7; 16]).unwrap();
        assert_eq!(endpoint.get_subpath("299593").unwrap(), vec![7; 16]);
        assert!(endpoint.get_subpath("299594").is_err());
        assert_eq!(endpoint.full_path("299593"), "sled://cold/299593");
    }

    #[test]
    fn ensure_put_retries_through_transient_failures() {
        let endpoint = FlakyEndpoint::new(2);
        ensure_put(&endpoint, "42", &[5, 5, 5]);

        assert_eq!(endpoint.attempts(), 3);
        assert_eq!(endpoint.inner().get_subpath("42").unwrap(), vec![5, 5, 5]);
    }

    #[test]
    fn ensure_put_succeeds_immediately_when_healthy() {
        let endpoint = FlakyEndpoint::new(0);
        ensure_put(&endpoint, "0", &[]);
        assert_eq!(endpoint.attempts(), 1);
    }
}
