//! Page filename generation
//!
//! New pages need a filename nobody else has used in the base directory.
//! The archive does not care how that name is produced; it asks a
//! [`NameGenerator`] and relies on create-exclusive open to catch collisions.

use uuid::Uuid;

/// Produces fresh page filenames on demand.
pub trait NameGenerator: Send {
    /// Return a filename not yet used in the archive's base directory.
    fn generate(&mut self) -> String;
}

/// Random v4 UUIDs, lowercase and hyphenated
/// (e.g. `1b4e28ba-2fa1-41d2-883f-0016d3cca427`).
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidNameGenerator;

impl NameGenerator for UuidNameGenerator {
    fn generate(&mut self) -> String {
        Uuid::new_v4().hyphenated().to_string()
    }
}

/// `{prefix}{n:06}` with a counter starting at 1.
///
/// Deterministic names for tooling and tests.
#[derive(Debug, Clone)]
pub struct SequentialNameGenerator {
    prefix: String,
    next: u64,
}

impl SequentialNameGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 1,
        }
    }
}

impl NameGenerator for SequentialNameGenerator {
    fn generate(&mut self) -> String {
        let name = format!("{}{:06}", self.prefix, self.next);
        self.next += 1;
        name
    }
}
