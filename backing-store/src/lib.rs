use std::{
    fs::File,
    io::{Read, Seek, SeekFrom, Write},
    mem::size_of,
    sync::{Arc, Mutex},
};

use log::info;

const HEADER_SIZE: usize = size_of::<u32>() * 2;

/// Simulated swap disk: holds the last written-back copy of each page.
///
/// The image file starts with a header recording the geometry, followed by a
/// bitmap of which pages hold a saved copy, followed by the page data. The
/// bitmap is kept in memory and flushed back into the image on drop, so a
/// reconnected store still knows which pages were ever written back.
#[derive(Debug, Clone)]
pub struct BackingStore<const PAGE_SIZE: usize, const VIRTUAL_PAGES: usize> {
    file_name: String,
    file: Arc<Mutex<File>>,
    saved: Arc<Mutex<Vec<u8>>>,
}

pub fn make_name(name: &str) -> String {
    let name = name.replace("-", "_");
    let mut store_name = String::from("BACKING_STORE_");
    store_name.push_str(&name);
    store_name
}

fn write_header(file: &mut File, page_size: u32, virtual_pages: u32) -> Result<(), std::io::Error> {
    file.seek(SeekFrom::Start(0))?;
    file.write(&page_size.to_be_bytes())?;
    file.write(&virtual_pages.to_be_bytes())?;
    Ok(())
}

fn read_header(file: &mut File) -> Result<(u32, u32), std::io::Error> {
    let mut page_size = [0; size_of::<u32>()];
    let mut virtual_pages = [0; size_of::<u32>()];
    file.seek(SeekFrom::Start(0))?;
    file.read_exact(&mut page_size)?;
    file.read_exact(&mut virtual_pages)?;
    Ok((
        u32::from_be_bytes(page_size),
        u32::from_be_bytes(virtual_pages),
    ))
}

impl<const PAGE_SIZE: usize, const VIRTUAL_PAGES: usize> BackingStore<PAGE_SIZE, VIRTUAL_PAGES> {
    /// How many bytes are required to store the saved-page bitmap
    fn bitmap_size() -> usize {
        VIRTUAL_PAGES / 8 + if VIRTUAL_PAGES % 8 == 0 { 0 } else { 1 }
    }

    fn image_size() -> u64 {
        (HEADER_SIZE + Self::bitmap_size() + VIRTUAL_PAGES * PAGE_SIZE) as u64
    }

    fn page_offset(page_number: usize) -> u64 {
        (HEADER_SIZE + Self::bitmap_size() + page_number * PAGE_SIZE) as u64
    }

    pub fn create(name: &str) -> Result<Self, std::io::Error> {
        let mut file = File::options()
            .truncate(true)
            .write(true)
            .read(true)
            .create(true)
            .open(make_name(name))?;
        file.set_len(Self::image_size())?;
        write_header(&mut file, PAGE_SIZE as u32, VIRTUAL_PAGES as u32)?;
        Ok(Self {
            file_name: String::from(name),
            file: Arc::new(Mutex::new(file)),
            saved: Arc::new(Mutex::new(vec![0; Self::bitmap_size()])),
        })
    }

    pub fn connect(name: &str) -> Result<Self, std::io::Error> {
        let mut file = File::options()
            .write(true)
            .read(true)
            .open(make_name(name))?;
        let (page_size, virtual_pages) = read_header(&mut file)?;
        assert_eq!(PAGE_SIZE, page_size as usize, "Incorrect page size");
        assert_eq!(
            VIRTUAL_PAGES, virtual_pages as usize,
            "Incorrect virtual page count"
        );
        let mut saved = vec![0; Self::bitmap_size()];
        file.seek(SeekFrom::Start(HEADER_SIZE as u64))?;
        file.read_exact(&mut saved)?;
        Ok(Self {
            file_name: String::from(name),
            file: Arc::new(Mutex::new(file)),
            saved: Arc::new(Mutex::new(saved)),
        })
    }

    /// Overwrite the saved copy of a page. The page number must already be
    /// validated by the caller.
    pub fn save(&self, page_number: usize, bytes: &[u8; PAGE_SIZE]) {
        assert!(
            page_number < VIRTUAL_PAGES,
            "Page {} outside the virtual address space",
            page_number
        );
        let mut file = self.file.lock().unwrap();
        info!("Start writing page[{}]", page_number);
        file.seek(SeekFrom::Start(Self::page_offset(page_number)))
            .unwrap();
        file.write(bytes).unwrap();
        let mut saved = self.saved.lock().unwrap();
        saved[page_number / 8] |= 1 << (page_number % 8);
        info!("Done writing page[{}]", page_number);
    }

    /// Read back the saved copy of a page, or `None` if it was never saved.
    pub fn load(&self, page_number: usize) -> Option<Box<[u8; PAGE_SIZE]>> {
        assert!(
            page_number < VIRTUAL_PAGES,
            "Page {} outside the virtual address space",
            page_number
        );
        if !self.contains(page_number) {
            return None;
        }
        let mut file = self.file.lock().unwrap();
        info!("Start reading page[{}]", page_number);
        file.seek(SeekFrom::Start(Self::page_offset(page_number)))
            .unwrap();
        let mut buf = Box::new([0; PAGE_SIZE]);
        file.read_exact(&mut *buf).unwrap();
        info!("Done reading page[{}]", page_number);
        Some(buf)
    }

    pub fn contains(&self, page_number: usize) -> bool {
        let saved = self.saved.lock().unwrap();
        saved[page_number / 8] & (1 << (page_number % 8)) != 0
    }
}

impl<const PAGE_SIZE: usize, const VIRTUAL_PAGES: usize> Drop
    for BackingStore<PAGE_SIZE, VIRTUAL_PAGES>
{
    fn drop(&mut self) {
        info!("Flushing saved-page bitmap of {}", self.file_name);
        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start(HEADER_SIZE as u64)).unwrap();
        let saved = self.saved.lock().unwrap();
        file.write(saved.as_slice()).unwrap();
    }
}
