use paged_vm::{MemoryManager, PAGE_SIZE, PHYSICAL_FRAMES, VIRTUAL_PAGES};

fn main() {
    env_logger::init();

    let mut vm: MemoryManager<PAGE_SIZE, VIRTUAL_PAGES, PHYSICAL_FRAMES> =
        MemoryManager::init("demo").unwrap();
    println!("---- Memory manager initialized ----");

    let vaddr = 3 * PAGE_SIZE + 10;
    vm.write_byte(vaddr, 99).unwrap();
    let value = vm.read_byte(vaddr).unwrap();
    println!("vaddr {} holds {}", vaddr, value);
    assert_eq!(value, 99);

    // Touch more distinct pages than there are frames so page 3 gets
    // evicted (dirty, so written back) and must be reloaded.
    for page_number in 0..PHYSICAL_FRAMES + 1 {
        vm.write_byte(page_number * PAGE_SIZE, page_number as u8)
            .unwrap();
    }

    let value = vm.read_byte(vaddr).unwrap();
    println!(
        "vaddr {} holds {} after cycling {} pages through {} frames",
        vaddr,
        value,
        PHYSICAL_FRAMES + 1,
        PHYSICAL_FRAMES
    );
    assert_eq!(value, 99);

    println!("---- Statistics ----");
    println!("Page faults:    {}", vm.page_faults());
    println!("Page evictions: {}", vm.page_evictions());
    println!("Resident pages: {}", vm.resident_pages());
    println!("Free frames:    {}", vm.free_frames());
}
