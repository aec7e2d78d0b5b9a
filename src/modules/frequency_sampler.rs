// src/modules/frequency_sampler.rs
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::globals::FREQUENCY_PLACEHOLDER;
use crate::helper::CpuFreqHelper;

/// One frequency reading for one core, consumed by the cell update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreSample {
    pub core_index: usize,
    pub frequency_label: String,
}

struct Completion {
    ticket: u64,
    core: usize,
    label: Option<String>,
}

type SampleCallback = Box<dyn FnOnce(CoreSample)>;

struct Outstanding {
    ticket: u64,
    callback: SampleCallback,
}

/// Issues per-core frequency requests to one worker thread per core and runs
/// their callbacks on the thread that owns the sampler.
///
/// Callbacks fire from [`dispatch`](Self::dispatch) or [`wait`](Self::wait).
/// A request whose helper call fails or panics still completes, with the
/// placeholder label. Each core has at most one helper call in flight: a new
/// request for a busy core takes over the outstanding one, and the request it
/// replaces is answered at once with the placeholder.
pub struct FrequencySampler {
    helper: Arc<dyn CpuFreqHelper>,
    tx: Sender<Completion>,
    rx: Receiver<Completion>,
    workers: HashMap<usize, Sender<u64>>,
    pending: HashMap<usize, Outstanding>,
    next_ticket: u64,
}

impl FrequencySampler {
    pub fn new(helper: Arc<dyn CpuFreqHelper>) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            helper,
            tx,
            rx,
            workers: HashMap::new(),
            pending: HashMap::new(),
            next_ticket: 0,
        }
    }

    /// Number of requests still waiting for a helper answer.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn get_frequency_async<F>(&mut self, core: usize, callback: F)
    where
        F: FnOnce(CoreSample) + 'static,
    {
        if let Some(outstanding) = self.pending.get_mut(&core) {
            let superseded = std::mem::replace(&mut outstanding.callback, Box::new(callback));
            superseded(placeholder_sample(core));
            return;
        }

        let ticket = self.next_ticket;
        self.next_ticket = self.next_ticket.wrapping_add(1);
        self.pending.insert(
            core,
            Outstanding {
                ticket,
                callback: Box::new(callback),
            },
        );

        let sent = match self.worker(core) {
            Some(worker) => worker.send(ticket).is_ok(),
            None => false,
        };
        if !sent {
            self.workers.remove(&core);
            let _ = self.tx.send(Completion { ticket, core, label: None });
        }
    }

    fn worker(&mut self, core: usize) -> Option<&Sender<u64>> {
        if !self.workers.contains_key(&core) {
            let (req_tx, req_rx) = mpsc::channel::<u64>();
            let helper = Arc::clone(&self.helper);
            let tx = self.tx.clone();
            let spawned = thread::Builder::new()
                .name(format!("freq-cpu{}", core))
                .spawn(move || {
                    // exits once the sampler drops the request sender
                    while let Ok(ticket) = req_rx.recv() {
                        let label = read_guarded(helper.as_ref(), core);
                        if tx.send(Completion { ticket, core, label }).is_err() {
                            break;
                        }
                    }
                });

            if let Err(e) = spawned {
                log::warn!("Failed to spawn sampler for cpu{}: {}", core, e);
                return None;
            }
            self.workers.insert(core, req_tx);
        }
        self.workers.get(&core)
    }

    /// Run callbacks for every completion that has already arrived.
    pub fn dispatch(&mut self) -> usize {
        let mut delivered = 0;
        while let Ok(completion) = self.rx.try_recv() {
            if self.deliver(completion) {
                delivered += 1;
            }
        }
        delivered
    }

    /// Block until all outstanding requests complete or `timeout` elapses,
    /// running callbacks as completions arrive.
    pub fn wait(&mut self, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        let mut delivered = self.dispatch();

        while !self.pending.is_empty() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match self.rx.recv_timeout(remaining) {
                Ok(completion) => {
                    if self.deliver(completion) {
                        delivered += 1;
                    }
                }
                Err(_) => break,
            }
        }

        delivered
    }

    fn deliver(&mut self, completion: Completion) -> bool {
        let matches = self
            .pending
            .get(&completion.core)
            .is_some_and(|o| o.ticket == completion.ticket);
        if !matches {
            return false;
        }

        let outstanding = match self.pending.remove(&completion.core) {
            Some(o) => o,
            None => return false,
        };
        match completion.label {
            Some(label) => (outstanding.callback)(CoreSample {
                core_index: completion.core,
                frequency_label: label,
            }),
            None => {
                log::debug!("No frequency for cpu{}", completion.core);
                (outstanding.callback)(placeholder_sample(completion.core));
            }
        }
        true
    }
}

fn placeholder_sample(core: usize) -> CoreSample {
    CoreSample {
        core_index: core,
        frequency_label: FREQUENCY_PLACEHOLDER.to_string(),
    }
}

fn read_guarded(helper: &dyn CpuFreqHelper, core: usize) -> Option<String> {
    panic::catch_unwind(AssertUnwindSafe(|| helper.get_frequency(core)))
        .ok()
        .flatten()
        .filter(|label| !label.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EvenCoresHelper;

    impl CpuFreqHelper for EvenCoresHelper {
        fn get_info_string(&self, _command: &str) -> Option<String> {
            None
        }

        fn get_frequency(&self, core: usize) -> Option<String> {
            if core % 2 == 0 {
                Some(format!("{}.00 GHz", core + 1))
            } else {
                None
            }
        }
    }

    struct PanickingHelper;

    impl CpuFreqHelper for PanickingHelper {
        fn get_info_string(&self, _command: &str) -> Option<String> {
            None
        }

        fn get_frequency(&self, _core: usize) -> Option<String> {
            panic!("helper went away");
        }
    }

    /// Answers slowly on the first call only.
    struct SlowFirstHelper {
        calls: AtomicUsize,
    }

    impl CpuFreqHelper for SlowFirstHelper {
        fn get_info_string(&self, _command: &str) -> Option<String> {
            None
        }

        fn get_frequency(&self, _core: usize) -> Option<String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call == 0 {
                thread::sleep(Duration::from_millis(300));
            }
            Some(format!("{}.00 GHz", call + 1))
        }
    }

    fn collect(sampler: &mut FrequencySampler, cores: usize) -> Rc<RefCell<Vec<CoreSample>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        for core in 0..cores {
            let seen = Rc::clone(&seen);
            sampler.get_frequency_async(core, move |sample| seen.borrow_mut().push(sample));
        }
        seen
    }

    #[test]
    fn test_every_request_completes() {
        let mut sampler = FrequencySampler::new(Arc::new(EvenCoresHelper));
        let seen = collect(&mut sampler, 4);

        assert_eq!(sampler.wait(Duration::from_secs(10)), 4);
        assert_eq!(sampler.pending(), 0);

        let mut samples = seen.borrow().clone();
        samples.sort_by_key(|s| s.core_index);
        let labels: Vec<_> = samples.iter().map(|s| s.frequency_label.as_str()).collect();
        assert_eq!(labels, vec!["1.00 GHz", "---", "3.00 GHz", "---"]);
    }

    #[test]
    fn test_panicking_helper_yields_placeholder() {
        let mut sampler = FrequencySampler::new(Arc::new(PanickingHelper));
        let seen = collect(&mut sampler, 2);

        sampler.wait(Duration::from_secs(10));
        assert_eq!(seen.borrow().len(), 2);
        assert!(seen.borrow().iter().all(|s| s.frequency_label == FREQUENCY_PLACEHOLDER));
    }

    #[test]
    fn test_dispatch_without_requests() {
        let mut sampler = FrequencySampler::new(Arc::new(EvenCoresHelper));
        assert_eq!(sampler.dispatch(), 0);
        assert_eq!(sampler.wait(Duration::from_millis(10)), 0);
    }

    #[test]
    fn test_late_completion_answers_newest_request() {
        let helper = Arc::new(SlowFirstHelper { calls: AtomicUsize::new(0) });
        let mut sampler = FrequencySampler::new(helper.clone());
        let shown = Rc::new(RefCell::new(Vec::new()));

        let tick1 = Rc::clone(&shown);
        sampler.get_frequency_async(0, move |s| tick1.borrow_mut().push(("tick1", s.frequency_label)));
        sampler.wait(Duration::from_millis(20));
        assert_eq!(sampler.pending(), 1);
        assert!(shown.borrow().is_empty());

        // the core is still busy, so tick 2 takes over the outstanding request
        let tick2 = Rc::clone(&shown);
        sampler.get_frequency_async(0, move |s| tick2.borrow_mut().push(("tick2", s.frequency_label)));
        assert_eq!(*shown.borrow(), vec![("tick1", "---".to_string())]);

        sampler.wait(Duration::from_secs(5));
        assert_eq!(sampler.pending(), 0);
        assert_eq!(shown.borrow()[1], ("tick2", "1.00 GHz".to_string()));

        // nothing older can arrive after it
        assert_eq!(sampler.wait(Duration::from_millis(50)), 0);
        assert_eq!(shown.borrow().len(), 2);

        let tick3 = Rc::clone(&shown);
        sampler.get_frequency_async(0, move |s| tick3.borrow_mut().push(("tick3", s.frequency_label)));
        sampler.wait(Duration::from_secs(5));
        assert_eq!(shown.borrow()[2], ("tick3", "2.00 GHz".to_string()));
        assert_eq!(helper.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_busy_core_keeps_one_request() {
        let helper = Arc::new(SlowFirstHelper { calls: AtomicUsize::new(0) });
        let mut sampler = FrequencySampler::new(helper.clone());
        let seen = Rc::new(RefCell::new(Vec::new()));

        for _ in 0..5 {
            let seen = Rc::clone(&seen);
            sampler.get_frequency_async(0, move |s| seen.borrow_mut().push(s.frequency_label));
        }
        assert_eq!(sampler.pending(), 1);
        assert_eq!(seen.borrow().len(), 4);

        sampler.wait(Duration::from_secs(5));
        assert_eq!(*seen.borrow().last().unwrap(), "1.00 GHz");
        assert_eq!(seen.borrow().len(), 5);
        assert_eq!(helper.calls.load(Ordering::SeqCst), 1);
    }
}
