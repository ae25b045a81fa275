//! Outcome of `Archive::save`

use std::fmt;

/// One page as reported by a save
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedPage {
    /// Filename relative to the archive's base directory
    pub filename: String,
    /// Whether the page had unsaved changes before this save
    pub has_changes: bool,
}

/// Every page of an archive, oldest first, as of one `save`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveResult {
    files: Vec<SavedPage>,
}

impl SaveResult {
    pub(crate) fn push(&mut self, file: SavedPage) {
        self.files.push(file);
    }

    pub fn files(&self) -> &[SavedPage] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Filenames of the pages this save actually wrote
    pub fn changed(&self) -> impl Iterator<Item = &str> + '_ {
        self.files
            .iter()
            .filter(|file| file.has_changes)
            .map(|file| file.filename.as_str())
    }
}

impl IntoIterator for SaveResult {
    type Item = SavedPage;
    type IntoIter = std::vec::IntoIter<SavedPage>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.into_iter()
    }
}

impl fmt::Display for SaveResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for file in &self.files {
            let status = if file.has_changes { " changed " } else { "no change" };
            writeln!(f, "Archive file [{}] = {}", status, file.filename)?;
        }
        Ok(())
    }
}
