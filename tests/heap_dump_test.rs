// Integration tests for heap-list dumps

use tinyscope::config::InspectorConfig;
use tinyscope::errors::{CorruptionKind, InspectError};
use tinyscope::heap::preview::Preview;
use tinyscope::heap::{HeapSnapshotFormatter, ListName};
use tinyscope::session::value::Value;
use tinyscope::session::SessionError;
use tinyscope::sim::constants::HEAP_ADDRESS_START;
use tinyscope::sim::layout::{FieldKind, StructLayout};
use tinyscope::sim::{SimulatedProcess, TinyallocImage};

const BASE: u64 = HEAP_ADDRESS_START;

fn formatter() -> HeapSnapshotFormatter {
    HeapSnapshotFormatter::new(InspectorConfig::default())
}

/// Four blocks: b0..b2 form the free list (sizes 8, 16, 32), b3 stays fresh
fn three_node_free_list() -> TinyallocImage {
    let mut image = TinyallocImage::new(BASE, 0x1000, 4).expect("image setup failed");
    let (b0, b1, b2, b3) = (image.block(0), image.block(1), image.block(2), image.block(3));
    image.write_block(b0, 0, b1, 8).unwrap();
    image.write_block(b1, 0, b2, 16).unwrap();
    image.write_block(b2, 0, 0, 32).unwrap();
    image.set_root(ListName::Free, b0).unwrap();
    image.set_root(ListName::Fresh, b3).unwrap();
    image
}

#[test]
fn test_empty_lists_render_header_and_three_empty_sections() {
    let image = TinyallocImage::new(BASE, 0x1000, 0).expect("image setup failed");

    let text = formatter().dump(image.process()).expect("dump failed");

    assert_eq!(
        text,
        "Heap start: \t0x10000000\n\
         Heap top: \t268435488\n\
         Heap limit: \t0x10001000\n\
         Heap blocks: \t0\n\
         free: 0x0\n\
         \n\
         used: 0x0\n\
         \n\
         fresh: 0x0\n"
    );
}

#[test]
fn test_free_list_renders_in_root_to_tail_order() {
    let image = three_node_free_list();
    let (b0, b1, b2, b3) = (image.block(0), image.block(1), image.block(2), image.block(3));

    let snapshot = formatter().snapshot(image.process()).expect("snapshot failed");

    let free = snapshot.list(ListName::Free).unwrap();
    assert_eq!(free.root, b0);
    let nodes: Vec<_> = free.blocks.iter().map(|b| (b.node, b.next, b.size)).collect();
    assert_eq!(nodes, vec![(b0, b1, 8), (b1, b2, 16), (b2, 0, 32)]);
    assert!(free.blocks.iter().all(|b| b.addr == 0 && b.preview.is_none()));
    assert_eq!(free.total_size(), 56);

    // The other lists are unaffected by free's contents
    assert!(snapshot.list(ListName::Used).unwrap().blocks.is_empty());
    let fresh = snapshot.list(ListName::Fresh).unwrap();
    assert_eq!(fresh.blocks.len(), 1);
    assert_eq!(fresh.blocks[0].node, b3);
    assert!(snapshot.errors().is_empty());

    let text = snapshot.render();
    assert!(text.contains(
        "free: 0x10000020\n\
         0x10000020 = {\n\taddr = 0x0,\n\tnext = 0x10000038,\n\tsize = 8,\n}\n\
         0x10000038 = {\n\taddr = 0x0,\n\tnext = 0x10000050,\n\tsize = 16,\n}\n\
         0x10000050 = {\n\taddr = 0x0,\n\tnext = 0x0,\n\tsize = 32,\n}\n\
         \n\
         used: 0x0\n\
         \n\
         fresh: 0x10000068\n"
    ));
}

#[test]
fn test_header_reports_descriptor_top_limit_and_capacity() {
    let image = three_node_free_list();

    let snapshot = formatter().snapshot(image.process()).unwrap();

    assert_eq!(snapshot.descriptor, BASE);
    assert_eq!(snapshot.top, Value::Size(image.top()));
    assert_eq!(snapshot.limit, Value::Pointer(BASE + 0x1000));
    assert_eq!(snapshot.max_blocks, Value::Size(image.max_blocks() as u64));
}

#[test]
fn test_cycle_terminates_with_corrupted_list_and_keeps_prefix() {
    let mut image = three_node_free_list();
    let (b0, b1, b2) = (image.block(0), image.block(1), image.block(2));
    // b2 points back to b1: b0 -> b1 -> b2 -> b1 -> ...
    image.write_block(b2, 0, b1, 32).unwrap();

    let snapshot = formatter().snapshot(image.process()).expect("snapshot failed");

    let free = snapshot.list(ListName::Free).unwrap();
    let walked: Vec<_> = free.blocks.iter().map(|b| b.node).collect();
    assert_eq!(walked, vec![b0, b1, b2]);
    assert_eq!(
        free.error(),
        Some(InspectError::CorruptedList {
            list: ListName::Free,
            address: b1,
            kind: CorruptionKind::Cycle,
        })
    );

    // The fresh list still renders after the corrupted one
    assert_eq!(snapshot.list(ListName::Fresh).unwrap().blocks.len(), 1);
    let text = snapshot.render();
    assert!(text.contains(
        "<CorruptedListError: free list corrupted at node 0x10000038: \
         next chain revisits an earlier node>\n\nused: 0x0\n"
    ));
    assert!(text.ends_with(
        "fresh: 0x10000068\n0x10000068 = {\n\taddr = 0x0,\n\tnext = 0x0,\n\tsize = 0,\n}\n"
    ));
}

#[test]
fn test_self_loop_is_a_cycle_of_length_one() {
    let mut image = three_node_free_list();
    let b3 = image.block(3);
    image.write_block(b3, 0, b3, 0).unwrap();

    let snapshot = formatter().snapshot(image.process()).unwrap();

    let fresh = snapshot.list(ListName::Fresh).unwrap();
    assert_eq!(fresh.blocks.len(), 1);
    assert!(matches!(
        fresh.error(),
        Some(InspectError::CorruptedList { address, .. }) if address == b3
    ));
    assert_eq!(snapshot.list(ListName::Free).unwrap().blocks.len(), 3);
}

#[test]
fn test_unreadable_node_ends_only_that_list() {
    let mut image = three_node_free_list();
    image.set_root(ListName::Used, 0xdead_0000).unwrap();

    let snapshot = formatter().snapshot(image.process()).unwrap();

    let used = snapshot.list(ListName::Used).unwrap();
    assert!(used.blocks.is_empty());
    assert!(matches!(
        used.error(),
        Some(InspectError::CorruptedList {
            kind: CorruptionKind::Unreadable { .. },
            address: 0xdead_0000,
            ..
        })
    ));
    assert_eq!(snapshot.list(ListName::Free).unwrap().blocks.len(), 3);
    assert_eq!(snapshot.errors().len(), 1);
}

#[test]
fn test_preview_omits_pointer_prefix() {
    let mut image = TinyallocImage::new(BASE, 0x1000, 2).unwrap();
    let ptr = image.carve(16, b"hello\0").unwrap();

    let text = formatter().dump(image.process()).unwrap();

    let expected = format!(
        "used: 0x10000020\n0x10000020 = {{\n\taddr = 0x{:x},\n\tnext = 0x0,\n\t\
         size = 16,\n\tcontent = \"hello\"\n}}\n",
        ptr
    );
    assert!(text.contains(&expected), "dump was:\n{}", text);
    let content = text.lines().find(|l| l.starts_with("\tcontent")).unwrap();
    assert!(!content.contains("0x"));
}

#[test]
fn test_null_addr_gets_no_preview() {
    let image = three_node_free_list();

    let text = formatter().dump(image.process()).unwrap();

    assert!(!text.contains("content"));
}

#[test]
fn test_preview_is_bounded_and_escaped() {
    let mut image = TinyallocImage::new(BASE, 0x1000, 2).unwrap();
    image.carve(16, b"abcdefgh\0").unwrap();
    image.carve(4, b"a\xffb\0").unwrap();
    let formatter = HeapSnapshotFormatter::new(InspectorConfig::default().with_preview_limit(4));

    let snapshot = formatter.snapshot(image.process()).unwrap();

    let previews: Vec<_> = snapshot
        .list(ListName::Used)
        .unwrap()
        .blocks
        .iter()
        .map(|b| b.preview.clone().unwrap().to_string())
        .collect();
    // Newest allocation is at the head of used
    assert_eq!(previews, vec!["\"a\\377b\"", "\"abcd\"..."]);
}

#[test]
fn test_unreadable_payload_gets_placeholder() {
    let mut image = TinyallocImage::new(BASE, 0x1000, 1).unwrap();
    let b0 = image.block(0);
    image.write_block(b0, 0x4000, 0, 8).unwrap();
    image.set_root(ListName::Fresh, 0).unwrap();
    image.set_root(ListName::Used, b0).unwrap();

    let snapshot = formatter().snapshot(image.process()).unwrap();

    let block = &snapshot.list(ListName::Used).unwrap().blocks[0];
    assert_eq!(
        block.preview,
        Some(Preview::Unreadable {
            reason: "cannot access memory at address 0x4000".to_string()
        })
    );
    assert!(snapshot
        .render()
        .contains("\tcontent = <error: cannot access memory at address 0x4000>\n"));
}

#[test]
fn test_missing_heap_symbol_propagates() {
    let process = SimulatedProcess::new();

    let result = formatter().dump(&process);

    assert_eq!(
        result,
        Err(InspectError::SymbolResolution {
            symbol: "heap".to_string(),
            source: SessionError::UnknownSymbol("heap".to_string()),
        })
    );
}

#[test]
fn test_missing_global_names_the_symbol() {
    let image = three_node_free_list();
    let config = InspectorConfig {
        limit_symbol: "heap_end".to_string(),
        ..InspectorConfig::default()
    };

    let err = HeapSnapshotFormatter::new(config)
        .dump(image.process())
        .unwrap_err();

    assert_eq!(err.category(), "SymbolResolutionError");
    assert!(err.to_string().contains("heap_end"));
}

#[test]
fn test_signed_block_size_fails_instead_of_reading_zero() {
    let mut image = three_node_free_list();
    let b0 = image.block(0);
    let process = image.process_mut();
    process.define_struct(StructLayout::new(
        "Block",
        &[
            ("addr", FieldKind::Pointer),
            ("next", FieldKind::Pointer),
            ("size", FieldKind::Int),
        ],
    ));
    process
        .write_field(b0, "Block", "size", &Value::Int(-1))
        .unwrap();

    let err = formatter().snapshot(image.process()).unwrap_err();

    match err {
        InspectError::SymbolResolution { symbol, source } => {
            assert_eq!(symbol, "Block.size");
            assert!(matches!(source, SessionError::TypeMismatch { .. }));
        }
        other => panic!("expected a symbol resolution error, got {:?}", other),
    }
}

#[test]
fn test_dump_after_exit_fails() {
    let mut image = three_node_free_list();
    image.process_mut().exit(0);

    let err = formatter().dump(image.process()).unwrap_err();

    assert!(matches!(
        err,
        InspectError::SymbolResolution {
            source: SessionError::NotRunning,
            ..
        }
    ));
}

#[test]
fn test_dump_is_deterministic() {
    let mut image = TinyallocImage::new(BASE, 0x1000, 4).unwrap();
    let first = image.carve(8, b"one\0").unwrap();
    image.carve(8, b"two\0").unwrap();
    image.release(first).unwrap();

    let a = formatter().dump(image.process()).unwrap();
    let b = formatter().dump(image.process()).unwrap();

    assert_eq!(a, b);
}

#[test]
fn test_snapshot_exports_json() {
    let mut image = three_node_free_list();
    image.carve(8, b"x\0").unwrap();

    let json = formatter().snapshot(image.process()).unwrap().to_json().unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(parsed["lists"][0]["name"], "free");
    assert_eq!(parsed["lists"][0]["blocks"].as_array().unwrap().len(), 3);
    assert_eq!(parsed["lists"][1]["blocks"][0]["preview"]["text"], "x");
    assert_eq!(parsed["max_blocks"], 4);
}
