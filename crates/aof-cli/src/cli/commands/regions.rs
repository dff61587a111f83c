//! `aof regions` – list the region table.

use aof_core::region::REGIONS;

pub fn run_regions() {
    println!("{:<4} {:<6} {:<10} {}", "ID", "SHORT", "PLATFORM", "NAME");
    for r in REGIONS {
        println!("{:<4} {:<6} {:<10} {}", r.id, r.short_name, r.platform, r.name);
    }
}
