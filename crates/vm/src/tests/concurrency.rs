use super::*;
use std::thread;

#[test]
fn test_concurrent_faults_with_eviction() {
    const TASKS: usize = 4;
    const PAGES: usize = 6;

    let h = Harness::new(8, 64);
    let tasks: Vec<_> = (0..TASKS)
        .map(|pid| {
            let (task, _pd) = h.spawn(pid + 1);
            load_anon(&task, PAGES);
            task
        })
        .collect();

    thread::scope(|s| {
        for task in &tasks {
            let h = &h;
            s.spawn(move || {
                let tag = task.pid() as u8;
                for round in 0..3u8 {
                    for i in 0..PAGES {
                        let value = [tag ^ round ^ i as u8; 48];
                        h.vm.copy_to_user(task.as_ref(), data_page(i), &value)
                            .unwrap();
                    }
                    for i in 0..PAGES {
                        let mut buf = [0u8; 48];
                        h.vm.copy_from_user(task.as_ref(), data_page(i), &mut buf)
                            .unwrap();
                        assert_eq!(buf, [tag ^ round ^ i as u8; 48]);
                    }
                }
            });
        }
    });

    assert!(h.frames().evictions() > 0);
    assert_eq!(h.frames().pinned_count(), 0);
    for task in &tasks {
        assert_residency_duality(&h, task.space());
    }

    for task in &tasks {
        h.vm.exit(task.as_ref(), 0);
    }
    let info = h.vm.stats();
    assert_eq!(info.free_frames, info.total_frames);
    assert_eq!(info.used_swap_slots, 0);
}
