use std::thread;

use hdf5_iotest::LocalComm;

/// Runs `func` on every rank of a thread group of `size`, collecting the results in rank
/// order.
#[allow(dead_code)]
pub fn run_group<T, F>(size: usize, func: F) -> Vec<T>
where
    T: Send,
    F: Fn(LocalComm) -> T + Sync,
{
    let func = &func;
    thread::scope(|s| {
        let handles: Vec<_> =
            LocalComm::group(size).into_iter().map(|comm| s.spawn(move || func(comm))).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}
