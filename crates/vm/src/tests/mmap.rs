use super::*;
use crate::error::VmError;
use crate::manager::FATAL_EXIT_STATUS;
use crate::page::Backing;
use uapi::mm::MAP_FAILED;

#[test]
fn test_map_and_read() {
    let h = Harness::new(4, 4);
    let (task, _pd) = h.spawn(1);
    let data: Vec<u8> = (0..5000).map(|i| (i % 199) as u8).collect();
    let file = install_file(&task, 3, &data);

    assert_eq!(h.vm.map(task.as_ref(), 3, MMAP_BASE), Ok(1));
    assert_eq!(task.space().page_count(), 2);
    assert_eq!(task.space().resident_count(), 0);
    assert_eq!(file.reopen_count(), 1);

    let mut buf = [0xffu8; 8];
    h.vm.copy_from_user(task.as_ref(), MMAP_BASE + PAGE_SIZE + 900, &mut buf)
        .unwrap();
    assert_eq!(&buf[..4], &data[4996..5000]);
    assert_eq!(&buf[4..], &[0u8; 4]);
}

#[test]
fn test_map_argument_failures() {
    let h = Harness::new(4, 4);
    let (task, _pd) = h.spawn(1);
    let file = install_file(&task, 3, b"0123456789");
    task.add_file(4, Arc::new(MockFile::console()));
    install_file(&task, 5, b"");

    let cases = [
        (0, MMAP_BASE, VmError::BadFile),
        (1, MMAP_BASE, VmError::BadFile),
        (7, MMAP_BASE, VmError::BadFile),
        (4, MMAP_BASE, VmError::BadFile),
        (3, 0, VmError::Misaligned),
        (3, MMAP_BASE + 16, VmError::Misaligned),
        (5, MMAP_BASE, VmError::EmptyFile),
    ];
    for (fd, addr, expected) in cases {
        let err = h.vm.map(task.as_ref(), fd, addr).unwrap_err();
        assert_eq!(err, expected, "fd={} addr={:#x}", fd, addr);
        assert!(!err.is_fatal());
    }
    assert_eq!(task.space().page_count(), 0);
    assert_eq!(file.reopen_count(), 0);
}

#[test]
fn test_overlap_rejected() {
    let h = Harness::new(4, 4);
    let (task, _pd) = h.spawn(1);
    let file = install_file(&task, 3, &[7u8; 2 * PAGE_SIZE]);
    load_anon(&task, 1);

    assert_eq!(h.vm.map(task.as_ref(), 3, MMAP_BASE), Ok(1));
    assert_eq!(task.space().page_count(), 3);

    let stack_limit = stack_top() - vm_config().max_stack_size();
    for addr in [
        MMAP_BASE + PAGE_SIZE,
        DATA_BASE,
        stack_top() - PAGE_SIZE,
        stack_limit - PAGE_SIZE,
    ] {
        assert_eq!(
            h.vm.map(task.as_ref(), 3, addr),
            Err(VmError::Overlap),
            "addr={:#x}",
            addr
        );
    }
    assert_eq!(task.space().page_count(), 3);
    assert_eq!(task.space().mmaps().lock().len(), 1);
    // 与已有页重叠时文件已被重新打开，失败后关闭
    assert_eq!(file.reopen_count(), 3);
    assert_eq!(file.close_count(), 2);
}

#[test]
fn test_write_back_round_trip_after_eviction() {
    let h = Harness::new(2, 8);
    let (task, _pd) = h.spawn(1);
    let file = install_file(&task, 3, &[b'x'; PAGE_SIZE]);
    let id = h.vm.map(task.as_ref(), 3, MMAP_BASE).unwrap();
    h.vm.copy_to_user(task.as_ref(), MMAP_BASE, b"hello world")
        .unwrap();

    // 用无关的匿名页耗尽帧池
    load_anon(&task, 3);
    for i in 0..3 {
        h.vm.copy_to_user(task.as_ref(), data_page(i), &[1u8; 16])
            .unwrap();
    }
    {
        let spt = task.space().spt().lock();
        let desc = spt.lookup(MMAP_BASE).unwrap();
        assert!(!desc.is_resident());
        assert!(matches!(desc.backing, Backing::Mmap { id: m, .. } if m == id));
    }
    assert_eq!(&file.contents()[..11], b"hello world");

    let mut buf = [0u8; 11];
    h.vm.copy_from_user(task.as_ref(), MMAP_BASE, &mut buf)
        .unwrap();
    assert_eq!(&buf, b"hello world");

    h.vm.unmap(task.as_ref(), id).unwrap();
    let contents = file.contents();
    assert_eq!(contents.len(), PAGE_SIZE);
    assert_eq!(&contents[..11], b"hello world");
    assert!(contents[11..].iter().all(|&b| b == b'x'));
}

#[test]
fn test_unmap_writes_back_resident_dirty_pages() {
    let h = Harness::new(4, 4);
    let (task, _pd) = h.spawn(1);
    let file = install_file(&task, 3, &[0u8; 5000]);
    let id = h.vm.map(task.as_ref(), 3, MMAP_BASE).unwrap();

    h.vm.copy_to_user(task.as_ref(), MMAP_BASE + PAGE_SIZE + 10, b"abc")
        .unwrap();
    // 写在文件末尾之后、页尾零区内的数据不会扩展文件
    h.vm.copy_to_user(task.as_ref(), MMAP_BASE + PAGE_SIZE + 1000, b"zzz")
        .unwrap();
    h.vm.unmap(task.as_ref(), id).unwrap();

    let contents = file.contents();
    assert_eq!(contents.len(), 5000);
    assert_eq!(&contents[PAGE_SIZE + 10..PAGE_SIZE + 13], b"abc");
    assert!(contents[..PAGE_SIZE].iter().all(|&b| b == 0));
}

#[test]
fn test_unmap_removes_pages_and_ids_are_never_reused() {
    let h = Harness::new(4, 4);
    let (task, pd) = h.spawn(1);
    let file = install_file(&task, 3, &[1u8; 2 * PAGE_SIZE]);

    let id = h.vm.map(task.as_ref(), 3, MMAP_BASE).unwrap();
    let mut buf = [0u8; 4];
    h.vm.copy_from_user(task.as_ref(), MMAP_BASE, &mut buf)
        .unwrap();
    assert_eq!(h.frames().len(), 1);

    h.vm.unmap(task.as_ref(), id).unwrap();
    assert_eq!(task.space().page_count(), 0);
    assert!(h.frames().is_empty());
    assert_eq!(pd.mapped_count(), 0);
    assert_eq!(file.close_count(), 1);

    let err = h.vm.unmap(task.as_ref(), id).unwrap_err();
    assert_eq!(err, VmError::UnknownMapping);
    assert!(err.is_fatal());

    assert_eq!(h.vm.map(task.as_ref(), 3, MMAP_BASE), Ok(id + 1));
}

#[test]
fn test_sync_keeps_mapping() {
    let h = Harness::new(4, 4);
    let (task, pd) = h.spawn(1);
    let file = install_file(&task, 3, &[0u8; 64]);
    let id = h.vm.map(task.as_ref(), 3, MMAP_BASE).unwrap();

    h.vm.copy_to_user(task.as_ref(), MMAP_BASE, b"sync").unwrap();
    let vpn = Vpn::containing(MMAP_BASE);
    assert!(pd.get(vpn.0).unwrap().dirty);

    h.vm.sync(task.as_ref(), id).unwrap();
    assert_eq!(&file.contents()[..4], b"sync");
    assert!(!pd.get(vpn.0).unwrap().dirty);
    assert_eq!(task.space().resident_count(), 1);
    assert_eq!(file.close_count(), 0);

    assert_eq!(h.vm.sync(task.as_ref(), id + 1), Err(VmError::UnknownMapping));
}

#[test]
fn test_syscall_wrappers() {
    let h = Harness::new(4, 4);
    let (task, _pd) = h.spawn(1);
    install_file(&task, 3, b"data");

    assert_eq!(h.vm.sys_mmap(task.as_ref(), 0, MMAP_BASE), MAP_FAILED);
    assert_eq!(task.exit_status(), None);

    let id = h.vm.sys_mmap(task.as_ref(), 3, MMAP_BASE);
    assert_eq!(id, 1);
    h.vm.sys_munmap(task.as_ref(), id);
    assert_eq!(task.exit_status(), None);

    h.vm.sys_mmap(task.as_ref(), 3, MMAP_BASE);
    h.vm.sys_munmap(task.as_ref(), 42);
    assert_eq!(task.exit_status(), Some(FATAL_EXIT_STATUS));
    assert_eq!(task.space().page_count(), 0);
    assert!(task.space().mmaps().lock().is_empty());
}
