#![no_main]
use libfuzzer_sys::{fuzz_target, arbitrary::{Arbitrary, Unstructured}};
use slsql::{DatabaseFile, OpenFlags, SlsVfs, Vfs};

#[derive(Debug, Arbitrary)]
enum FileOp {
    Write { offset: u16, data: Vec<u8> },
    Read { offset: u16, len: u16 },
    Size,
}

// Replays writes and reads against an in-memory model of the file
fuzz_target!(|input: &[u8]| {
    let mut u = Unstructured::new(input);

    let ops: Vec<FileOp> = match u.arbitrary() {
        Ok(ops) => ops,
        Err(_) => return,
    };

    let dir = match tempfile::TempDir::new() {
        Ok(d) => d,
        Err(_) => return,
    };
    let path = dir.path().join("fuzz.db");
    let flags = OpenFlags::from_raw(
        libsqlite3_sys::SQLITE_OPEN_READWRITE | libsqlite3_sys::SQLITE_OPEN_CREATE,
    );
    let mut file = SlsVfs::default()
        .open(path.to_str(), flags)
        .expect("open in temp dir");
    let mut model: Vec<u8> = Vec::new();

    for op in ops.iter().take(32) {
        match op {
            FileOp::Write { offset, data } => {
                let offset = *offset as usize;
                file.write(data, offset as u64).expect("write");
                if data.is_empty() {
                    continue;
                }
                if model.len() < offset + data.len() {
                    model.resize(offset + data.len(), 0);
                }
                model[offset..offset + data.len()].copy_from_slice(data);
            }
            FileOp::Read { offset, len } => {
                let (offset, len) = (*offset as usize, *len as usize);
                let mut buf = vec![0xFF; len];
                let complete = file.read(&mut buf, offset as u64).is_ok();

                let mut expected = vec![0u8; len];
                if offset < model.len() {
                    let end = model.len().min(offset + len);
                    expected[..end - offset].copy_from_slice(&model[offset..end]);
                }
                assert_eq!(buf, expected);
                assert_eq!(complete, len == 0 || offset + len <= model.len());
            }
            FileOp::Size => {
                assert_eq!(file.file_size().expect("size"), model.len() as u64);
            }
        }
    }
});
