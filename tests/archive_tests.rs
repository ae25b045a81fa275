//! Tests for Archive
//!
//! These tests verify:
//! - Write-once `set` semantics
//! - Page rollover when the newest page fills up
//! - Persistence across save / reopen by page name
//! - Newest-page-wins routing for reads
//! - Partial-key lookups across pages
//! - Save results and error propagation

use std::fs::{self, OpenOptions};
use std::path::Path;

use archivekv::page::DATA_START;
use archivekv::{
    Archive, ArchiveError, Config, Key, Page, SequentialNameGenerator, MAX_ITEMS_PER_INDEX,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_archive() -> (TempDir, Archive) {
    let temp_dir = TempDir::new().unwrap();
    let archive = sequential_archive(temp_dir.path());
    (temp_dir, archive)
}

fn sequential_archive(dir: &Path) -> Archive {
    let config = Config::builder().base_dir(dir).build();
    Archive::with_name_generator(config, Box::new(SequentialNameGenerator::new("page-")))
}

fn numbered_key(n: u32) -> Key {
    let mut key = [0u8; 20];
    key[0] = (n.wrapping_mul(2654435761) >> 24) as u8;
    key[16..20].copy_from_slice(&n.to_be_bytes());
    key
}

fn random_entries(count: usize, seed: u64) -> Vec<(Key, Vec<u8>)> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let key: Key = rng.gen();
            let len = rng.gen_range(0..512);
            let data = (0..len).map(|_| rng.gen()).collect();
            (key, data)
        })
        .collect()
}

fn reopen(dir: &Path, filenames: &[String]) -> Archive {
    let config = Config::builder()
        .base_dir(dir)
        .pages(filenames.iter().cloned())
        .build();
    Archive::open(config).unwrap()
}

/// Save a one-entry page, then make its header claim `data_size` bytes of
/// data and grow the file (sparse) to match
fn saved_page_with_data_size(dir: &Path, name: &str, key: &Key, data_size: u32) {
    let mut page = Page::create(dir, name).unwrap();
    page.set(key, b"seed").unwrap();
    page.save().unwrap();
    page.free().unwrap();

    let path = dir.join(name);
    let mut bytes = fs::read(&path).unwrap();
    bytes[20..24].copy_from_slice(&data_size.to_be_bytes());
    fs::write(&path, bytes).unwrap();
    let file = OpenOptions::new().write(true).open(&path).unwrap();
    file.set_len(DATA_START + data_size as u64).unwrap();
}

fn saved_filenames(archive: &mut Archive) -> Vec<String> {
    archive
        .save()
        .unwrap()
        .into_iter()
        .map(|file| file.filename)
        .collect()
}

// =============================================================================
// Scenario Tests
// =============================================================================

#[test]
fn test_two_values_one_file_reopen() {
    let temp = TempDir::new().unwrap();
    let key_a: Key = [21, 19, 18, 17, 16, 15, 14, 13, 12, 11, 10, 9, 8, 7, 6, 5, 4, 3, 2, 1];
    let key_b: Key = [124; 20];

    let mut archive = Archive::init(temp.path());
    archive.add_empty_page().unwrap();
    archive.set(&key_a, b"the data").unwrap();
    archive.set(&key_b, b"the other data").unwrap();
    let saved = archive.save().unwrap();
    archive.free().unwrap();

    assert_eq!(saved.len(), 1);
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 1);
    let filename = saved.files()[0].filename.clone();
    // UUID v4, lowercase, hyphenated
    assert_eq!(filename.len(), 36);
    assert_eq!(filename, filename.to_lowercase());

    let mut archive = Archive::init(temp.path());
    archive.add_page_by_name(&filename).unwrap();
    let value = archive.get_partial(&key_b, None).unwrap();
    assert_eq!(value.data, b"the other data");
    assert_eq!(value.size, 14);
    assert_eq!(archive.get(&key_a).unwrap(), b"the data");
    archive.free().unwrap();
}

// =============================================================================
// Write-Once Tests
// =============================================================================

#[test]
fn test_second_set_with_different_data_is_noop() {
    let (_temp, mut archive) = setup_temp_archive();
    let key = numbered_key(1);

    archive.set(&key, b"first").unwrap();
    archive.set(&key, b"second, longer").unwrap();

    assert_eq!(archive.get(&key).unwrap(), b"first");
    assert_eq!(archive.len(), 1);
    archive.free().unwrap();
}

#[test]
fn test_repeated_identical_set_does_not_duplicate() {
    let (_temp, mut archive) = setup_temp_archive();
    let key = numbered_key(1);

    archive.set(&key, b"same").unwrap();
    archive.set(&key, b"same").unwrap();

    assert_eq!(archive.len(), 1);
    let page = archive.pages().next().unwrap();
    assert_eq!(page.data_size(), 4);
    archive.free().unwrap();
}

#[test]
fn test_set_is_write_once_across_pages() {
    let (_temp, mut archive) = setup_temp_archive();
    for n in 0..MAX_ITEMS_PER_INDEX as u32 {
        archive.set(&numbered_key(n), b"old").unwrap();
    }
    archive.set(&numbered_key(50_000), b"new page").unwrap();
    assert_eq!(archive.page_count(), 2);

    // Key lives in the older page; the newer page must not get a copy
    archive.set(&numbered_key(7), b"again").unwrap();

    assert_eq!(archive.get(&numbered_key(7)).unwrap(), b"old");
    assert_eq!(archive.pages().last().unwrap().len(), 1);
    archive.free().unwrap();
}

// =============================================================================
// Rollover Tests
// =============================================================================

#[test]
fn test_rollover_page_count() {
    let (temp, mut archive) = setup_temp_archive();
    archive.add_empty_page().unwrap();
    let n = 2;
    let total = MAX_ITEMS_PER_INDEX * n + 1;

    for i in 0..total as u32 {
        archive.set(&numbered_key(i), &i.to_le_bytes()).unwrap();
    }

    assert_eq!(archive.page_count(), n + 1);
    let lens: Vec<usize> = archive.pages().map(Page::len).collect();
    assert_eq!(lens, vec![2000, 2000, 1]);
    assert_eq!(archive.len(), total);

    let names: Vec<&str> = archive.pages().map(Page::filename).collect();
    assert_eq!(names, vec!["page-000001", "page-000002", "page-000003"]);
    assert!(temp.path().join("page-000003").exists());

    for i in [0u32, 1999, 2000, 3999, 4000] {
        assert_eq!(archive.get(&numbered_key(i)).unwrap(), i.to_le_bytes());
    }
    archive.free().unwrap();
}

#[test]
fn test_set_on_archive_without_pages_adds_one() {
    let (temp, mut archive) = setup_temp_archive();
    assert_eq!(archive.page_count(), 0);

    archive.set(&numbered_key(1), b"v").unwrap();

    assert_eq!(archive.page_count(), 1);
    assert!(temp.path().join("page-000001").exists());
    archive.free().unwrap();
}

#[test]
fn test_rollover_name_collision_surfaces_error() {
    let (temp, mut archive) = setup_temp_archive();
    fs::write(temp.path().join("page-000001"), b"squatter").unwrap();

    let result = archive.set(&numbered_key(1), b"v");

    assert!(matches!(
        result,
        Err(ArchiveError::Io(ref e)) if e.kind() == std::io::ErrorKind::AlreadyExists
    ));
    assert_eq!(archive.page_count(), 0);
    assert_eq!(fs::read(temp.path().join("page-000001")).unwrap(), b"squatter");
    archive.free().unwrap();
}

#[test]
fn test_rollover_when_data_region_full() {
    let temp = TempDir::new().unwrap();
    saved_page_with_data_size(temp.path(), "big", &numbered_key(1), u32::MAX - 5);
    let mut archive = sequential_archive(temp.path());
    archive.add_page_by_name("big").unwrap();

    archive.set(&numbered_key(2), &[9u8; 10]).unwrap();

    assert_eq!(archive.page_count(), 2);
    let names: Vec<&str> = archive.pages().map(Page::filename).collect();
    assert_eq!(names, vec!["big", "page-000001"]);
    let lens: Vec<usize> = archive.pages().map(Page::len).collect();
    assert_eq!(lens, vec![1, 1]);
    assert_eq!(archive.get(&numbered_key(2)).unwrap(), [9u8; 10]);
    assert_eq!(archive.get(&numbered_key(1)).unwrap(), b"seed");
    archive.free().unwrap();
}

#[cfg(target_pointer_width = "64")]
#[test]
fn test_value_larger_than_any_page_is_rejected_without_new_page() {
    let (temp, mut archive) = setup_temp_archive();
    archive.set(&numbered_key(1), b"small").unwrap();
    // Zeroed allocation; the pages are never touched
    let huge = vec![0u8; u32::MAX as usize + 1];

    let result = archive.set(&numbered_key(2), &huge);

    assert!(matches!(
        result,
        Err(ArchiveError::ValueTooLarge { size, .. }) if size == u32::MAX as usize + 1
    ));
    assert!(!result.unwrap_err().is_rollover());
    assert_eq!(archive.page_count(), 1);
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 1);
    assert!(!archive.has(&numbered_key(2)));

    // Same check at the page level
    let mut page = Page::create(temp.path(), "direct").unwrap();
    assert!(matches!(
        page.set(&numbered_key(3), &huge),
        Err(ArchiveError::ValueTooLarge { .. })
    ));
    assert!(page.is_empty());
    assert_eq!(page.data_size(), 0);
    page.free().unwrap();
    archive.free().unwrap();
}

// =============================================================================
// Persistence Tests
// =============================================================================

#[test]
fn test_round_trip_persistence() {
    let (temp, mut archive) = setup_temp_archive();
    let entries = random_entries(4500, 7);
    for (key, data) in &entries {
        archive.set(key, data).unwrap();
    }
    let filenames = saved_filenames(&mut archive);
    archive.free().unwrap();
    assert_eq!(filenames.len(), 3);

    let archive = reopen(temp.path(), &filenames);

    assert_eq!(archive.page_count(), 3);
    assert_eq!(archive.len(), entries.len());
    for (key, data) in &entries {
        let fetched = archive.get_partial(key, None).unwrap();
        assert_eq!(&fetched.data, data);
        assert_eq!(fetched.size, data.len() as u64);
    }
    archive.free().unwrap();
}

#[test]
fn test_filenames_stable_across_saves() {
    let (temp, mut archive) = setup_temp_archive();
    archive.set(&numbered_key(1), b"a").unwrap();
    let first = saved_filenames(&mut archive);

    archive.set(&numbered_key(2), b"b").unwrap();
    let second = saved_filenames(&mut archive);

    assert_eq!(first, second);
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 1);
    archive.free().unwrap();
}

#[test]
fn test_save_reports_changed_pages() {
    let (temp, mut archive) = setup_temp_archive();
    for n in 0..=MAX_ITEMS_PER_INDEX as u32 {
        archive.set(&numbered_key(n), b"x").unwrap();
    }
    let filenames = saved_filenames(&mut archive);
    archive.free().unwrap();

    let mut archive = reopen(temp.path(), &filenames);
    let untouched = archive.save().unwrap();
    assert!(untouched.files().iter().all(|f| !f.has_changes));
    assert_eq!(untouched.changed().count(), 0);

    archive.set(&numbered_key(90_000), b"y").unwrap();
    let result = archive.save().unwrap();

    let flags: Vec<bool> = result.files().iter().map(|f| f.has_changes).collect();
    assert_eq!(flags, vec![false, true]);
    assert_eq!(result.changed().collect::<Vec<_>>(), vec!["page-000002"]);
    assert_eq!(
        result.to_string(),
        "Archive file [no change] = page-000001\nArchive file [ changed ] = page-000002\n"
    );
    archive.free().unwrap();
}

#[test]
fn test_save_empty_archive() {
    let (_temp, mut archive) = setup_temp_archive();

    let result = archive.save().unwrap();

    assert!(result.is_empty());
    archive.free().unwrap();
}

#[test]
fn test_open_creates_base_dir() {
    let temp = TempDir::new().unwrap();
    let base = temp.path().join("nested").join("archive");

    let archive = Archive::open(Config::builder().base_dir(&base).build()).unwrap();

    assert!(base.is_dir());
    archive.free().unwrap();
}

#[test]
fn test_open_rejects_file_as_base_dir() {
    let temp = TempDir::new().unwrap();
    let not_a_dir = temp.path().join("file");
    fs::write(&not_a_dir, b"").unwrap();

    let result = Archive::open(Config::builder().base_dir(&not_a_dir).build());

    assert!(matches!(result, Err(ArchiveError::Config(_))));
}

#[test]
fn test_open_with_missing_page_fails() {
    let temp = TempDir::new().unwrap();
    let config = Config::builder().base_dir(temp.path()).page("ghost").build();

    let result = Archive::open(config);

    assert!(matches!(result, Err(ArchiveError::Io(_))));
}

// =============================================================================
// Routing Tests
// =============================================================================

#[test]
fn test_newest_page_wins_for_duplicate_keys() {
    let temp = TempDir::new().unwrap();
    let key = numbered_key(42);

    // Bypass Archive::set to put the same key in two pages
    let mut older = Page::create(temp.path(), "older").unwrap();
    older.set(&key, b"from older").unwrap();
    let mut newer = Page::create(temp.path(), "newer").unwrap();
    newer.set(&key, b"from newer").unwrap();

    let mut archive = sequential_archive(temp.path());
    archive.add_page(older);
    archive.add_page(newer);

    assert!(archive.has(&key));
    assert_eq!(archive.get(&key).unwrap(), b"from newer");
    assert_eq!(archive.has_partial(&key[..4]).unwrap(), Some(key));
    archive.free().unwrap();
}

#[test]
fn test_reads_fall_through_to_older_pages() {
    let (_temp, mut archive) = setup_temp_archive();
    for n in 0..MAX_ITEMS_PER_INDEX as u32 + 10 {
        archive.set(&numbered_key(n), &n.to_be_bytes()).unwrap();
    }

    assert_eq!(archive.get(&numbered_key(3)).unwrap(), 3u32.to_be_bytes());
    assert_eq!(
        archive.get(&numbered_key(2005)).unwrap(),
        2005u32.to_be_bytes()
    );
    archive.free().unwrap();
}

#[test]
fn test_read_error_in_newer_page_is_not_masked() {
    let temp = TempDir::new().unwrap();
    let key = numbered_key(8);

    let mut older = Page::create(temp.path(), "older").unwrap();
    older.set(&key, b"healthy copy").unwrap();
    let mut newer = Page::create(temp.path(), "newer").unwrap();
    newer.set(&key, b"damaged copy").unwrap();
    let file = OpenOptions::new().write(true).open(newer.path()).unwrap();
    file.set_len(DATA_START + 3).unwrap();
    drop(file);

    let mut archive = sequential_archive(temp.path());
    archive.add_page(older);
    archive.add_page(newer);

    let result = archive.get(&key);

    assert!(matches!(result, Err(ArchiveError::ReadTruncated { .. })));
    archive.free().unwrap();
}

#[test]
fn test_missing_key_everywhere_is_not_found() {
    let (_temp, mut archive) = setup_temp_archive();
    archive.set(&numbered_key(1), b"x").unwrap();
    archive.add_empty_page().unwrap();

    let result = archive.get(&numbered_key(2));

    assert!(matches!(result, Err(ArchiveError::KeyNotFound)));
    assert!(result.unwrap_err().is_not_found());
    assert!(!archive.has(&numbered_key(2)));
    archive.free().unwrap();
}

#[test]
fn test_lookup_on_empty_archive() {
    let (_temp, archive) = setup_temp_archive();

    assert!(!archive.has(&numbered_key(1)));
    assert_eq!(archive.has_partial(&[1, 2, 3]).unwrap(), None);
    assert!(matches!(
        archive.get_partial(&[1, 2, 3], None),
        Err(ArchiveError::KeyNotFound)
    ));
    archive.free().unwrap();
}

// =============================================================================
// Partial Key Tests
// =============================================================================

#[test]
fn test_partial_keys_sharing_twelve_byte_prefix() {
    let (_temp, mut archive) = setup_temp_archive();
    let mut key_a: Key = [0x5A; 20];
    let mut key_b: Key = [0x5A; 20];
    key_a[12] = 0xA0;
    key_b[12] = 0xB0;
    archive.set(&key_a, b"value a").unwrap();
    archive.set(&key_b, b"value b").unwrap();

    // 12 bytes: both keys match; the scan resolves to the first stored
    let ambiguous = archive.get_partial(&key_b[..12], None).unwrap();
    assert_eq!(&ambiguous.key[..12], &key_b[..12]);
    assert_eq!(ambiguous.key, key_a);
    assert_eq!(ambiguous.data, b"value a");

    // 15 bytes: only one key matches
    let exact_b = archive.get_partial(&key_b[..15], None).unwrap();
    assert_eq!(exact_b.key, key_b);
    assert_eq!(exact_b.data, b"value b");
    let exact_a = archive.get_partial(&key_a[..15], None).unwrap();
    assert_eq!(exact_a.key, key_a);
    archive.free().unwrap();
}

#[test]
fn test_every_prefix_length_resolves() {
    let (_temp, mut archive) = setup_temp_archive();
    let entries = random_entries(200, 11);
    for (key, data) in &entries {
        archive.set(key, data).unwrap();
    }
    let (key, data) = &entries[123];

    for len in 3..=20 {
        let resolved = archive.has_partial(&key[..len]).unwrap().unwrap();
        assert_eq!(&resolved[..len], &key[..len]);
    }
    let fetched = archive.get_partial(&key[..20], Some(10)).unwrap();
    assert_eq!(fetched.key, *key);
    assert_eq!(fetched.size, data.len() as u64);
    assert_eq!(fetched.data, data[..data.len().min(10)]);
    archive.free().unwrap();
}

#[test]
fn test_invalid_partial_length_rejected_at_archive() {
    let (_temp, mut archive) = setup_temp_archive();
    archive.set(&numbered_key(1), b"x").unwrap();

    assert!(matches!(
        archive.has_partial(&[0, 0]),
        Err(ArchiveError::InvalidPartialKeyLength(2))
    ));
    assert!(matches!(
        archive.get_partial(&[0; 21], None),
        Err(ArchiveError::InvalidPartialKeyLength(21))
    ));
    archive.free().unwrap();
}
