//! Voter identity for the client side.
//!
//! Each client holds one random session identifier, generated on first use
//! and persisted to a file so that later runs present the same identity. The
//! identifier is only a deduplication key; the server places no further
//! trust in it.

use std::fs::{self, File};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::{
    rngs::{OsRng, SmallRng},
    RngCore, SeedableRng,
};
use uuid::{Builder, Uuid};

/// What a provider found on disk.
enum Stored {
    Missing,
    Unreadable,
    Valid(String),
}

/// Produces the persistent session identifier stored at a given path.
#[derive(Debug, Clone)]
pub struct IdentityProvider {
    path: PathBuf,
}

impl IdentityProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The session identifier for this client, generating and persisting
    /// one on first use. Once a valid identifier has been written it is
    /// never replaced, even when several providers race on the same file.
    pub fn session_id(&self) -> io::Result<String> {
        let replace = match self.load()? {
            Stored::Valid(id) => return Ok(id),
            Stored::Missing => false,
            Stored::Unreadable => {
                warn!(
                    "Replacing unreadable session identifier in {}",
                    self.path.display()
                );
                true
            }
        };

        let fresh = generate_session_id();
        match self.persist(&fresh, replace) {
            Ok(()) => {
                info!("Generated voter session {fresh}");
                Ok(fresh)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                // Somebody else persisted first; theirs wins.
                match self.load()? {
                    Stored::Valid(id) => Ok(id),
                    _ => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }

    fn load(&self) -> io::Result<Stored> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                let contents = contents.trim();
                Ok(match Uuid::parse_str(contents) {
                    Ok(_) => Stored::Valid(contents.to_string()),
                    Err(_) => Stored::Unreadable,
                })
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Stored::Missing),
            Err(e) => Err(e),
        }
    }

    /// Write `id` to a scratch file, then move it into place in one step so
    /// readers never see a partial identifier. Unless `replace` is set, an
    /// existing file is left alone and `AlreadyExists` is returned.
    fn persist(&self, id: &str, replace: bool) -> io::Result<()> {
        let file_name = self.path.file_name().ok_or_else(|| {
            io::Error::new(
                ErrorKind::InvalidInput,
                format!("{} is not a file path", self.path.display()),
            )
        })?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut scratch_name = file_name.to_os_string();
        scratch_name.push(format!(".{:08x}.tmp", rand::random::<u32>()));
        let scratch = self.path.with_file_name(scratch_name);

        let result = File::create(&scratch)
            .and_then(|mut file| {
                file.write_all(id.as_bytes())?;
                file.sync_all()
            })
            .and_then(|()| {
                if replace {
                    fs::rename(&scratch, &self.path)
                } else {
                    fs::hard_link(&scratch, &self.path)
                }
            });
        // Already gone after a rename.
        let _ = fs::remove_file(&scratch);
        result
    }
}

/// Generate a fresh version 4 UUID in lowercase hyphenated form.
///
/// Randomness comes from the OS. If that is unavailable, a clock-seeded
/// PRNG is used instead: the result is still a well-formed UUID, just with
/// less entropy.
pub fn generate_session_id() -> String {
    let mut random = [0; 16];
    if let Err(e) = OsRng.try_fill_bytes(&mut random) {
        warn!("OS random source unavailable ({e}), using fallback generator");
        fallback_rng().fill_bytes(&mut random);
    }
    format_session_id(random)
}

fn fallback_rng() -> SmallRng {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or_default();
    SmallRng::seed_from_u64(nanos ^ u64::from(std::process::id()))
}

/// Stamp the version and variant bits onto 128 random bits.
fn format_session_id(random: [u8; 16]) -> String {
    Builder::from_random_bytes(random)
        .into_uuid()
        .hyphenated()
        .to_string()
}

/// Process-local state of the voter: who they are and whether they have
/// voted yet in this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoterSession {
    id: String,
    has_voted: bool,
}

impl VoterSession {
    /// `has_voted` should come from the server's duplicate check.
    pub fn new(id: String, has_voted: bool) -> Self {
        Self { id, has_voted }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn has_voted(&self) -> bool {
        self.has_voted
    }

    /// Record a successful submission.
    pub fn mark_voted(&mut self) {
        self.has_voted = true;
    }
}
