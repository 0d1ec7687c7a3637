use super::*;
use crate::error::VmError;
use crate::manager::FATAL_EXIT_STATUS;
use alloc::vec;

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[test]
fn test_segment_is_loaded_lazily() {
    let h = Harness::new(8, 8);
    let (task, _pd) = h.spawn(1);
    let data = pattern(5000);
    let file: Arc<dyn VmFile> = Arc::new(MockFile::new(&data));
    task.space()
        .load_segment(&file, 0, DATA_BASE, 5000, 2 * PAGE_SIZE - 5000, false)
        .unwrap();

    assert_eq!(task.space().page_count(), 2);
    assert_eq!(task.space().resident_count(), 0);
    assert!(h.frames().is_empty());

    let mut head = [0u8; 10];
    h.vm.copy_from_user(task.as_ref(), DATA_BASE, &mut head)
        .unwrap();
    assert_eq!(&head[..], &data[..10]);
    assert_eq!(task.space().resident_count(), 1);

    // 第二页只有 904 字节来自文件，其余填零
    let mut tail = [0xffu8; 8];
    h.vm.copy_from_user(task.as_ref(), DATA_BASE + PAGE_SIZE + 900, &mut tail)
        .unwrap();
    assert_eq!(&tail[..4], &data[4996..5000]);
    assert_eq!(&tail[4..], &[0u8; 4]);
    assert_eq!(h.frames().len(), 2);
    assert_residency_duality(&h, task.space());
}

#[test]
fn test_load_segment_rejects_misaligned() {
    let h = Harness::new(2, 2);
    let (task, _pd) = h.spawn(1);
    let file: Arc<dyn VmFile> = Arc::new(MockFile::new(b"abc"));
    assert_eq!(
        task.space()
            .load_segment(&file, 0, DATA_BASE + 1, 3, PAGE_SIZE - 3, false),
        Err(VmError::Misaligned)
    );
    assert_eq!(
        task.space().load_segment(&file, 0, DATA_BASE, 3, 100, false),
        Err(VmError::Misaligned)
    );
    assert_eq!(task.space().page_count(), 0);
}

#[test]
fn test_write_to_readonly_page_rejected() {
    let h = Harness::new(4, 4);
    let (task, _pd) = h.spawn(1);
    let file: Arc<dyn VmFile> = Arc::new(MockFile::new(&pattern(PAGE_SIZE)));
    task.space()
        .load_segment(&file, 0, DATA_BASE, PAGE_SIZE, 0, false)
        .unwrap();

    let err = h.vm.handle_fault(task.as_ref(), DATA_BASE, true).unwrap_err();
    assert_eq!(err, VmError::PermissionDenied);
    assert!(err.is_fatal());

    h.vm.handle_fault(task.as_ref(), DATA_BASE, false).unwrap();
    assert_eq!(
        h.vm.copy_to_user(task.as_ref(), DATA_BASE + 8, b"x"),
        Err(VmError::PermissionDenied)
    );
}

#[test]
fn test_invalid_addresses() {
    let h = Harness::new(4, 4);
    let (task, _pd) = h.spawn(1);
    assert_eq!(
        h.vm.handle_fault(task.as_ref(), 0, false),
        Err(VmError::InvalidAddress)
    );
    assert_eq!(
        h.vm.handle_fault(task.as_ref(), stack_top(), false),
        Err(VmError::InvalidAddress)
    );
    assert_eq!(
        h.vm.handle_fault(task.as_ref(), MMAP_BASE, false),
        Err(VmError::InvalidAddress)
    );
    let mut buf = [0u8; 4];
    assert_eq!(
        h.vm.copy_from_user(task.as_ref(), 8, &mut buf),
        Err(VmError::InvalidAddress)
    );
    assert_eq!(task.space().page_count(), 0);
}

#[test]
fn test_stack_growth_at_slack_boundary() {
    let h = Harness::new(4, 4);
    let (task, _pd) = h.spawn(1);
    let sp = stack_top() - PAGE_SIZE;
    task.set_sp(sp);

    h.vm.handle_fault(task.as_ref(), sp - 32, true).unwrap();
    assert_eq!(task.space().page_count(), 1);
    assert_eq!(task.space().resident_count(), 1);

    let mut buf = [0xffu8; 32];
    h.vm.copy_from_user(task.as_ref(), sp - 32, &mut buf).unwrap();
    assert_eq!(buf, [0u8; 32]);
}

#[test]
fn test_stack_growth_below_slack_rejected() {
    let h = Harness::new(4, 4);
    let (task, _pd) = h.spawn(1);
    let sp = stack_top() - PAGE_SIZE;
    task.set_sp(sp);

    assert_eq!(
        h.vm.handle_fault(task.as_ref(), sp - 33, false),
        Err(VmError::InvalidAddress)
    );
    assert_eq!(task.space().page_count(), 0);
}

#[test]
fn test_stack_growth_limit() {
    let h = Harness::new(4, 4);
    let (task, _pd) = h.spawn(1);
    let limit = stack_top() - vm_config().max_stack_size();

    task.set_sp(limit);
    h.vm.handle_fault(task.as_ref(), limit, true).unwrap();
    assert_eq!(task.space().page_count(), 1);

    task.set_sp(limit - 16);
    assert_eq!(
        h.vm.handle_fault(task.as_ref(), limit - 1, true),
        Err(VmError::InvalidAddress)
    );
    assert_eq!(task.space().page_count(), 1);
}

#[test]
fn test_unresolved_fault_terminates_process() {
    let h = Harness::new(4, 4);
    let (task, _pd) = h.spawn(1);
    assert!(!h.vm.on_page_fault(task.as_ref(), 0x10, false));
    assert_eq!(task.exit_status(), Some(FATAL_EXIT_STATUS));

    let (task, _pd) = h.spawn(2);
    assert!(h.vm.on_page_fault(task.as_ref(), stack_top() - 4, true));
    assert_eq!(task.exit_status(), None);
}

#[test]
fn test_check_user_buffer_touches_every_page() {
    let h = Harness::new(4, 4);
    let (task, _pd) = h.spawn(1);
    load_anon(&task, 3);

    h.vm.check_user_buffer(task.as_ref(), DATA_BASE, 0, false)
        .unwrap();
    assert_eq!(task.space().resident_count(), 0);

    h.vm.check_user_buffer(task.as_ref(), DATA_BASE + 100, 2 * PAGE_SIZE, true)
        .unwrap();
    assert_eq!(task.space().resident_count(), 3);

    assert_eq!(
        h.vm.check_user_buffer(task.as_ref(), usize::MAX - 10, 100, false),
        Err(VmError::InvalidAddress)
    );
    assert_eq!(
        h.vm.check_user_buffer(task.as_ref(), DATA_BASE, 4 * PAGE_SIZE, false),
        Err(VmError::InvalidAddress)
    );
}

#[test]
fn test_check_user_str_across_pages() {
    let h = Harness::new(4, 4);
    let (task, _pd) = h.spawn(1);
    load_anon(&task, 3);

    let start = data_page(1) - 3;
    h.vm.copy_to_user(task.as_ref(), start, b"hello\0").unwrap();
    assert_eq!(h.vm.check_user_str(task.as_ref(), start), Ok(5));
    assert_eq!(h.vm.check_user_str(task.as_ref(), DATA_BASE), Ok(0));
    assert_eq!(
        h.vm.check_user_str(task.as_ref(), MMAP_BASE),
        Err(VmError::InvalidAddress)
    );
}

#[test]
fn test_copy_to_user_marks_page_dirty() {
    let h = Harness::new(4, 4);
    let (task, pd) = h.spawn(1);
    load_anon(&task, 2);

    let bytes = vec![0x5au8; PAGE_SIZE + 16];
    h.vm.copy_to_user(task.as_ref(), DATA_BASE + 8, &bytes).unwrap();
    for i in 0..2 {
        let pte = pd.get(Vpn::containing(data_page(i)).0).unwrap();
        assert!(pte.dirty);
        assert!(pte.accessed);
        assert!(pte.writable);
    }

    let mut back = vec![0u8; bytes.len()];
    h.vm.copy_from_user(task.as_ref(), DATA_BASE + 8, &mut back)
        .unwrap();
    assert_eq!(back, bytes);
}
