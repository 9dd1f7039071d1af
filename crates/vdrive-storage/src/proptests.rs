use crate::{
    Completion, CompletionTracker, Drive, DriveBackend, FileBackend, Geometry, RamBackend,
    SECTOR_SIZE,
};
use proptest::prelude::*;
use proptest::test_runner::TestCaseResult;
use std::io::Write as _;

#[derive(Debug, Clone)]
enum Op {
    Write { lba: u32, fill: u8, sectors: u32 },
    Read { lba: u32, sectors: u32 },
}

const MAX_DISK_SECTORS: u32 = 256;
const MAX_OPS: usize = 48;
const MAX_RW_SECTORS: u32 = 24;

fn disk_sectors_strategy() -> impl Strategy<Value = u32> {
    1u32..=MAX_DISK_SECTORS
}

fn cache_block_size_strategy() -> impl Strategy<Value = usize> {
    // Small blocks so one request spans several of them.
    prop_oneof![Just(512usize), Just(1024usize), Just(4096usize), Just(8192usize)]
}

fn range_strategy(disk_sectors: u32) -> BoxedStrategy<(u32, u32)> {
    (0..disk_sectors)
        .prop_flat_map(move |lba| {
            let max = (disk_sectors - lba).min(MAX_RW_SECTORS);
            (Just(lba), 1u32..=max)
        })
        .boxed()
}

fn op_strategy(disk_sectors: u32) -> BoxedStrategy<Op> {
    prop_oneof![
        5 => (range_strategy(disk_sectors), any::<u8>())
            .prop_map(|((lba, sectors), fill)| Op::Write { lba, fill, sectors }),
        4 => range_strategy(disk_sectors).prop_map(|(lba, sectors)| Op::Read { lba, sectors }),
    ]
    .boxed()
}

fn scenario_strategy() -> BoxedStrategy<(u32, usize, Vec<Op>)> {
    (disk_sectors_strategy(), cache_block_size_strategy())
        .prop_flat_map(|(disk_sectors, block_size)| {
            (
                Just(disk_sectors),
                Just(block_size),
                prop::collection::vec(op_strategy(disk_sectors), 1..=MAX_OPS),
            )
        })
        .boxed()
}

fn seed_image(disk_sectors: u32) -> Vec<u8> {
    (0..disk_sectors as usize * SECTOR_SIZE)
        .map(|i| (i / SECTOR_SIZE) as u8 ^ (i % 7) as u8)
        .collect()
}

fn run_against_model(drive: &mut Drive, mut model: Vec<u8>, ops: &[Op]) -> TestCaseResult {
    let mut tracker = CompletionTracker::new();
    for op in ops {
        match *op {
            Op::Write { lba, fill, sectors } => {
                let offset = lba as usize * SECTOR_SIZE;
                let len = sectors as usize * SECTOR_SIZE;
                let data = vec![fill; len];
                drive
                    .write(&mut tracker, &data, offset as u64, Completion::noop())
                    .unwrap();
                model[offset..offset + len].copy_from_slice(&data);
            }
            Op::Read { lba, sectors } => {
                let offset = lba as usize * SECTOR_SIZE;
                let len = sectors as usize * SECTOR_SIZE;
                let mut buf = vec![0u8; len];
                drive
                    .read(&mut tracker, &mut buf, offset as u64, Completion::noop())
                    .unwrap();
                prop_assert_eq!(&buf[..], &model[offset..offset + len]);
            }
        }
        prop_assert!(!tracker.is_pending());
    }

    let mut all = vec![0u8; model.len()];
    drive
        .read(&mut tracker, &mut all, 0, Completion::noop())
        .unwrap();
    prop_assert_eq!(all, model);
    Ok(())
}

fn file_drive(image: &[u8], raw: bool, block_size: usize) -> (tempfile::NamedTempFile, Drive) {
    let mut tmp = tempfile::NamedTempFile::new().unwrap();
    tmp.write_all(image).unwrap();
    tmp.flush().unwrap();
    let backend = FileBackend::open_with_block_size(tmp.path(), raw, block_size).unwrap();
    let drive = Drive::with_backend(Box::new(backend), raw).unwrap();
    (tmp, drive)
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 48, .. ProptestConfig::default() })]

    #[test]
    fn ram_backend_matches_model((disk_sectors, _block, ops) in scenario_strategy()) {
        let image = seed_image(disk_sectors);
        let backend = RamBackend::from_vec(image.clone()).unwrap();
        let mut drive = Drive::with_backend(Box::new(backend), false).unwrap();
        run_against_model(&mut drive, image, &ops)?;
    }

    #[test]
    fn cached_file_backend_matches_model((disk_sectors, block_size, ops) in scenario_strategy()) {
        let image = seed_image(disk_sectors);
        let (tmp, mut drive) = file_drive(&image, false, block_size);
        run_against_model(&mut drive, image.clone(), &ops)?;
        drop(drive);
        // Overlay writes never reach the file.
        prop_assert_eq!(std::fs::read(tmp.path()).unwrap(), image);
    }

    #[test]
    fn raw_file_backend_matches_model((disk_sectors, block_size, ops) in scenario_strategy()) {
        let image = seed_image(disk_sectors);
        let (tmp, mut drive) = file_drive(&image, true, block_size);
        run_against_model(&mut drive, image, &ops)?;

        let mut tracker = CompletionTracker::new();
        let mut expected = vec![0u8; disk_sectors as usize * SECTOR_SIZE];
        drive.read(&mut tracker, &mut expected, 0, Completion::noop()).unwrap();
        drop(drive);
        prop_assert_eq!(std::fs::read(tmp.path()).unwrap(), expected);
    }

    #[test]
    fn cached_backend_loads_only_touched_blocks(
        (disk_sectors, block_size, ops) in scenario_strategy()
    ) {
        let image = seed_image(disk_sectors);
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&image).unwrap();
        tmp.flush().unwrap();
        let mut backend = FileBackend::open_with_block_size(tmp.path(), false, block_size).unwrap();

        let mut tracker = CompletionTracker::new();
        let mut touched = std::collections::BTreeSet::new();
        for op in &ops {
            let (lba, sectors) = match *op {
                Op::Write { lba, sectors, .. } | Op::Read { lba, sectors } => (lba, sectors),
            };
            let offset = lba as u64 * SECTOR_SIZE as u64;
            let len = sectors as usize * SECTOR_SIZE;
            let mut buf = vec![0u8; len];
            backend.read(&mut buf, offset, &mut tracker, Completion::noop()).unwrap();
            for s in lba..lba + sectors {
                touched.insert(s as usize * SECTOR_SIZE / block_size);
            }
        }
        prop_assert_eq!(backend.cache().resident_blocks(), touched.len());
        prop_assert_eq!(backend.cache_stats().blocks_loaded, touched.len() as u64);
    }

    #[test]
    fn geometry_never_exceeds_capacity(bytes in 0u64..(1u64 << 40)) {
        let geometry = Geometry::from_capacity(bytes);
        prop_assert_eq!(geometry.heads, 16);
        prop_assert_eq!(geometry.sectors_per_track, 63);
        prop_assert!(geometry.capacity_bytes() <= bytes);
        prop_assert!(geometry.cylinders * 16 * 63 <= geometry.sectors);
        prop_assert!(geometry.sectors - geometry.cylinders * 16 * 63 < 16 * 63);
    }
}
