// Dictionary integration suite.
//
// Each test documents what behavior is being verified and which
// invariants are assumed or asserted. The core invariants exercised:
// - Dedup: equal content always yields the same storage while present.
// - Balance: a string is present iff inserts outnumber removes.
// - Misuse: removing absent content fails without touching the table.
// - Growth: enlarging the table never loses or miscounts a string.
use rc_dict::{DictError, Dictionary, Interned, ResizePolicy};
use std::sync::Arc;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// Test: the walk-through scenario.
// Assumes: refcount starts at 1 and moves by one per insert/remove.
// Verifies: same pointer for both inserts; entry leaves the table (len
// drops by one) on the second remove; a third remove is NotFound.
#[test]
fn eth0_walkthrough() {
    init_logging();
    let dict = Dictionary::new().unwrap();
    let other = dict.insert("lo", 0).unwrap();

    let p1 = dict.insert("eth0", 0).unwrap();
    assert_eq!(dict.refcount("eth0"), Some(1));
    let p2 = dict.insert("eth0", 4).unwrap();
    assert_eq!(p1.as_ptr(), p2.as_ptr());
    assert_eq!(dict.refcount("eth0"), Some(2));
    assert_eq!(dict.len(), 2);

    dict.remove(&p1).unwrap();
    assert_eq!(dict.refcount("eth0"), Some(1));
    assert!(dict.contains("eth0"));

    dict.remove(&p1).unwrap();
    assert_eq!(dict.len(), 1);
    assert!(!dict.contains("eth0"));

    assert_eq!(dict.remove(&p1), Err(DictError::NotFound));
    dict.remove(&other).unwrap();
    assert_eq!(dict.clean(), 0);
}

// Test: remove without insert.
// Assumes: lookup is by content, not by handle.
// Verifies: NotFound, and the live count is unchanged.
#[test]
fn remove_without_insert_fails() {
    init_logging();
    let dict = Dictionary::new().unwrap();
    let keep = dict.insert("present", 0).unwrap();
    let before = dict.len();
    assert_eq!(dict.remove("absent"), Err(DictError::NotFound));
    assert_eq!(dict.len(), before);
    assert_eq!(dict.refcount("present"), Some(1));
    dict.remove(&keep).unwrap();
}

// Test: balanced lifecycle over many strings with varying multiplicity.
// Assumes: removes by content match inserts by content.
// Verifies: after exactly as many removes as inserts nothing is left, and
// each string disappears exactly on its last remove.
#[test]
fn balanced_lifecycle_empties_dictionary() {
    init_logging();
    let dict = Dictionary::new().unwrap();
    let mut held: Vec<(String, Vec<Interned>)> = Vec::new();
    for i in 0..64 {
        let s = format!("node-{i}");
        let copies = 1 + i % 4;
        let handles: Vec<Interned> = (0..copies).map(|_| dict.insert(&s, 0).unwrap()).collect();
        assert!(handles.iter().all(|h| h.ptr_eq(&handles[0])));
        assert_eq!(dict.refcount(&s), Some(copies as u32));
        held.push((s, handles));
    }
    assert_eq!(dict.len(), 64);

    for (s, handles) in &held {
        for (n, h) in handles.iter().enumerate() {
            assert!(dict.contains(s));
            dict.remove(h).unwrap();
            let left = handles.len() - n - 1;
            assert_eq!(dict.refcount(s), if left == 0 { None } else { Some(left as u32) });
        }
    }
    assert!(dict.is_empty());
    assert_eq!(dict.clean(), 0);
}

// Test: resize correctness.
// Assumes: the dictionary starts at 1024 buckets and doubles at 75%.
// Verifies: after at least two enlarges every string keeps its content and
// refcount, and table accounting stays consistent.
#[test]
fn growth_preserves_every_string() {
    init_logging();
    let dict = Dictionary::new().unwrap();
    let start = dict.stats().size;

    let names: Vec<String> = (0..3000).map(|i| format!("/mod:cont/list[key='{i}']")).collect();
    let mut handles: Vec<Interned> = Vec::new();
    for (i, n) in names.iter().enumerate() {
        handles.push(dict.insert(n, 0).unwrap());
        if i % 3 == 0 {
            handles.push(dict.insert(n, 0).unwrap());
        }
    }

    let stats = dict.stats();
    assert!(stats.size >= start * 4, "expected two enlarges, got {stats:?}");
    assert_eq!(stats.used as usize, names.len());
    assert_eq!(dict.len(), names.len());
    assert!(stats.occupied_buckets <= stats.used);
    assert!(stats.occupied_buckets > 0);

    for (i, n) in names.iter().enumerate() {
        let expected = if i % 3 == 0 { 2 } else { 1 };
        assert_eq!(dict.refcount(n), Some(expected), "refcount of {n}");
    }
    for h in &handles {
        assert!(dict.contains(h));
    }
    for h in &handles {
        dict.remove(h).unwrap();
    }
    assert!(dict.is_empty());
}

// Test: zero-copy duplicate.
// Assumes: the dictionary owns one strong reference, each handle one more.
// Verifies: the caller's duplicate buffer is released; the existing storage
// comes back with its refcount incremented.
#[test]
fn zero_copy_duplicate_releases_caller_buffer() {
    init_logging();
    let dict = Dictionary::new().unwrap();
    let first = dict.insert("urn:ietf:params:xml:ns:yang:ietf-interfaces", 0).unwrap();

    let buffer: Arc<str> = Arc::from("urn:ietf:params:xml:ns:yang:ietf-interfaces");
    let watch = Arc::downgrade(&buffer);
    let second = dict.insert_zero_copy(buffer).unwrap();

    assert_eq!(watch.strong_count(), 0);
    assert!(second.ptr_eq(&first));
    assert_eq!(
        dict.refcount("urn:ietf:params:xml:ns:yang:ietf-interfaces"),
        Some(2)
    );
    dict.remove(&first).unwrap();
    dict.remove(&second).unwrap();
}

// Test: zero-copy of new content.
// Verifies: the caller's allocation becomes the stored string.
#[test]
fn zero_copy_new_content_adopts_buffer() {
    init_logging();
    let dict = Dictionary::new().unwrap();
    let buffer: Arc<str> = Arc::from("adopted");
    let addr = buffer.as_ptr();
    let h = dict.insert_zero_copy(buffer).unwrap();
    assert_eq!(h.as_ptr(), addr);
    let again = dict.insert("adopted", 0).unwrap();
    assert_eq!(again.as_ptr(), addr);
    dict.remove(&h).unwrap();
    dict.remove(&again).unwrap();
}

// Test: custom sizing through the builder.
// Verifies: a small grow-and-shrink dictionary both grows and shrinks
// while keeping survivors.
#[test]
fn builder_grow_and_shrink() {
    init_logging();
    let dict = Dictionary::builder()
        .initial_capacity(16)
        .resize_policy(ResizePolicy::GrowAndShrink)
        .build()
        .unwrap();
    let handles: Vec<Interned> = (0..100).map(|i| dict.insert(&format!("v{i}"), 0).unwrap()).collect();
    let peak = dict.stats().size;
    assert!(peak > 16);
    for h in &handles[5..] {
        dict.remove(h).unwrap();
    }
    assert!(dict.stats().size < peak);
    for h in &handles[..5] {
        assert_eq!(dict.refcount(h), Some(1));
        dict.remove(h).unwrap();
    }
    assert_eq!(dict.clean(), 0);
}

// Test: handles outlive full removal safely.
// Assumes: stored strings are shared allocations.
// Verifies: a handle whose content was fully removed still reads its own
// bytes, and a fresh insert of the same content is a different allocation.
#[test]
fn stale_handle_stays_readable() {
    init_logging();
    let dict = Dictionary::new().unwrap();
    let old = dict.insert("ephemeral", 0).unwrap();
    dict.remove(&old).unwrap();
    let fresh = dict.insert("ephemeral", 0).unwrap();
    assert_eq!(old.as_str(), "ephemeral");
    assert!(!old.ptr_eq(&fresh));
    dict.remove(&fresh).unwrap();
    assert_eq!(dict.remove(&old), Err(DictError::NotFound));
}
