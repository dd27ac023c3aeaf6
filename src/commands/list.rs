//! List commands implementation

use romflash_core::memory::MemoryType;

/// List all supported memory types
pub fn list_chips() {
    println!("Supported memory types:");
    println!();
    println!("{:<10} {:>6} {:>10}", "Part", "Code", "Size");
    println!("{}", "-".repeat(28));

    for memory in MemoryType::ALL {
        println!(
            "{:<10} {:>6} {:>10}",
            memory.part_name(),
            memory.type_code(),
            format_size(memory.capacity())
        );
    }
}

fn format_size(bytes: usize) -> String {
    if bytes >= 1024 {
        format!("{} KiB", bytes / 1024)
    } else {
        format!("{} B", bytes)
    }
}
