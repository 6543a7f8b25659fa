use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use vigil_runtime::Error;
use vigil_runtime::bus::{LocalBus, PROBE_EXCHANGE};
use vigil_runtime::consumer::ConsumerConfig;
use vigil_runtime::event::{Event, EventType};
use vigil_runtime::observer::{ObserverAdapter, Pausable};
use vigil_runtime::probe::BusProbeFactory;
use vigil_runtime::source::{MonitorEvent, ProbeEventSource};

#[test]
fn intercepted_calls_reach_typed_observers() {
    let bus = LocalBus::new();
    let factory = BusProbeFactory::new(bus.clone());

    let invokes = ProbeEventSource::new("calls", EventType::Invoke, "service.work()");
    let failures = ProbeEventSource::new("errors", EventType::Exception, "service.work()");
    for (source, key) in [(&invokes, "Perf.calls"), (&failures, "Perf.errors")] {
        source.open_probe(factory.as_ref(), key).unwrap();
        source
            .start_consumer(bus.clone(), ConsumerConfig::new(PROBE_EXCHANGE, key))
            .unwrap();
    }

    let calls = Arc::new(AtomicUsize::new(0));
    let messages = Arc::new(Mutex::new(Vec::new()));
    {
        let calls = Arc::clone(&calls);
        invokes.subscribe(Arc::new(ObserverAdapter::new(
            "onCall",
            EventType::Invoke,
            move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        )));
        let messages = Arc::clone(&messages);
        failures.subscribe(Arc::new(ObserverAdapter::new(
            "onError",
            EventType::Exception,
            move |event| {
                if let Event::Exception(e) = event {
                    messages.lock().unwrap().push(e.message.clone());
                }
                Ok(())
            },
        )));
    }

    let probe_calls = factory.probe("Perf.calls").unwrap();
    let probe_errors = factory.probe("Perf.errors").unwrap();
    probe_calls.intercept("Service", "work", &[], || Ok(true)).unwrap();
    let _ = probe_errors.intercept::<bool, _>("Service", "work", &[], || {
        Err(Error::user("disk full"))
    });
    bus.flush().unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(*messages.lock().unwrap(), vec!["disk full".to_string()]);

    invokes.pause();
    probe_calls.intercept("Service", "work", &[], || Ok(true)).unwrap();
    bus.flush().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(invokes.consumer().unwrap().is_running());
}
