//! Demonstration binary: feeds a canned Erase/Write record through [`Core`]
//! and dumps the resulting screen, field table, and a Read Modified reply.
//!
//! Grounded on the teacher's `src/bin/tn3270_test.rs` demo-driver shape
//! (one `main` dispatching to a handful of named steps), trimmed down to
//! what this crate's public API actually needs to demonstrate.

use log::info;

use tn3270r::codec::CodePage;
use tn3270r::core::Core;
use tn3270r::replier::ReplyRequest;

fn main() {
    env_logger::init();

    println!("=== TN3270 core demo ===\n");

    let mut core = Core::new(24, 80, CodePage::Cp037);
    info!("session created, primary screen 24x80");

    // EraseWrite, WCC=restore-keyboard, SBA(0,0), "HELLO".
    let record: &[u8] = &[0xF5, 0x02, 0x11, 0x40, 0x40, 0xC8, 0xC5, 0xD3, 0xD3, 0xD6, 0xFF, 0xEF];
    let outcome = core.feed(record).expect("well-formed demo record");
    println!("records completed: {}", outcome.records_completed);

    let snapshot = core.snapshot_screen();
    println!("\nScreen ({}x{}, cursor={}, locked={}):", snapshot.rows, snapshot.cols, snapshot.cursor, snapshot.keyboard_locked);
    let codec = tn3270r::codec::Codec::new(CodePage::Cp037);
    let first_line: String = snapshot.cells[..snapshot.cols].iter().map(|&b| codec.decode(b)).collect();
    println!("  row 0: {:?}", first_line.trim_end());

    println!("\nFields:");
    for field in &snapshot.fields {
        println!("  start={} length={} protected={} numeric={} modified={}", field.start_address, field.length, field.protected, field.numeric, field.modified);
    }

    core.press_aid(tn3270r::core::Aid::Enter).expect("keyboard unlocked by demo record's WCC");
    let mut reply = [0u8; 64];
    let n = core.build_reply(ReplyRequest::ReadModified, &mut reply).expect("reply buffer large enough");
    println!("\nRead Modified reply ({} bytes): {:02X?}", n, &reply[..n]);
}
