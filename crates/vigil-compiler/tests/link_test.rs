use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::json;
use tempfile::TempDir;

use vigil_compiler::{Bindings, Compiler, CompilerConfig, Linker};
use vigil_runtime::bus::LocalBus;
use vigil_runtime::context::RuntimeContext;
use vigil_runtime::event::Event;
use vigil_runtime::failure::CapturingPolicy;
use vigil_runtime::monitor::Monitor;
use vigil_runtime::observer::Pausable;
use vigil_runtime::probe::BusProbeFactory;
use vigil_runtime::scheduler::ManualScheduler;
use vigil_runtime::store::SqliteStore;

fn write_trees(dir: &Path) {
    let tree = json!({
        "package": "demo",
        "declarations": [
            { "kind": "namespace", "name": "disk", "body": [
                { "kind": "variable", "name": "used", "initializer": { "kind": "literal", "value": { "number": "50" } }, "writable": true },
                { "kind": "variable", "name": "size", "initializer": { "kind": "source", "text": "probe_disk_size()" } }
            ] },
            { "kind": "monitor", "name": "Storage", "usings": [{ "name": "disk" }], "body": [
                { "kind": "variable", "name": "alerts", "initializer": { "kind": "literal", "value": { "number": "0" } }, "writable": true },
                { "kind": "event", "name": "grew", "emitter": {
                    "kind": "typed", "eventKind": "CHANGE",
                    "emitter": { "kind": "featureCall", "feature": "used", "receiver": { "kind": "featureCall", "feature": "disk" } },
                    "specifier": {
                        "kind": "logical", "operator": "OR",
                        "left": { "kind": "relational", "operator": "ABOVE", "value": { "kind": "literal", "value": { "number": "90" } } },
                        "right": { "kind": "relational", "operator": "ABOVE", "value": { "kind": "literal", "value": { "number": "10" } }, "percentage": true }
                    }
                } },
                { "kind": "event", "name": "writes", "emitter": {
                    "kind": "typed", "eventKind": "INVOKE",
                    "emitter": { "kind": "source", "text": "volume.write()" }
                } },
                { "kind": "event", "name": "sweep", "emitter": { "kind": "periodic", "cron": "0 0 * * *" } },
                { "kind": "handler", "name": "onGrew", "param": { "name": "e", "typ": "ChangeEvent" }, "body": { "source": "" } },
                { "kind": "handler", "name": "onWrite", "param": { "name": "e", "typ": "InvokeEvent" }, "body": { "source": "" } },
                { "kind": "handler", "name": "onSweep", "param": { "name": "e", "typ": "IntervalEvent" }, "body": { "source": "" } },
                { "kind": "code", "source": "subscribe all" }
            ] }
        ]
    });
    std::fs::write(dir.join("storage.json"), tree.to_string()).unwrap();
}

#[test]
fn lowered_monitors_run_against_a_sqlite_store() {
    let input = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    write_trees(input.path());

    let compiler = Compiler::new(CompilerConfig {
        input_dir: input.path().to_path_buf(),
        ..CompilerConfig::default()
    });
    let (types, report) = compiler.lower().unwrap();
    assert!(report.is_clean());

    let bus = LocalBus::new();
    let scheduler = ManualScheduler::new();
    let policy = CapturingPolicy::new();
    let probes = BusProbeFactory::new(bus.clone());
    let context = RuntimeContext::local()
        .with_bus(bus.clone())
        .with_probes(probes.clone())
        .with_scheduler(scheduler.clone())
        .with_store(SqliteStore::open(data.path().join("vars.db")).unwrap())
        .with_policy(policy.clone());

    let grew = Arc::new(Mutex::new(Vec::new()));
    let writes = Arc::new(AtomicUsize::new(0));
    let bindings = {
        let grew = Arc::clone(&grew);
        let writes = Arc::clone(&writes);
        Bindings::new()
            .value("disk.size", || Ok(json!(500)))
            .code("demo.Storage", 0, |monitor| {
                monitor.subscribe("grew", "onGrew")?;
                monitor.subscribe("writes", "onWrite")?;
                monitor.subscribe("sweep", "onSweep")
            })
            .handler("demo.Storage", "onGrew", move |monitor, event| {
                if let Event::Change(change) = event {
                    grew.lock().unwrap().push(change.current.clone());
                }
                let alerts = monitor.variable("alerts")?;
                let next = alerts.as_i64().unwrap_or(0) + 1;
                monitor.set_variable("alerts", json!(next))?;
                Ok(())
            })
            .handler("demo.Storage", "onWrite", move |_, _| {
                writes.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .handler("demo.Storage", "onSweep", |monitor, _| {
                monitor.namespace("disk")?.set("used", json!(0))?;
                Ok(())
            })
    };

    let mut linker = Linker::new(context.clone(), bindings);
    let linked = linker.link_all(&types).unwrap();
    assert!(policy.is_empty(), "{:?}", policy.failures());

    let disk = &linked.namespaces["disk"];
    let storage = &linked.monitors[0];
    assert_eq!(storage.name(), "demo.Storage");
    assert_eq!(disk.get("size").unwrap(), json!(500));
    assert_eq!(context.store.get("disk.used").unwrap(), json!(50));

    // 50 -> 52: neither above 90 nor a 10% move
    disk.set("used", json!(52)).unwrap();
    // 52 -> 60: a 15% move
    disk.set("used", json!(60)).unwrap();
    // 60 -> 95: above 90
    disk.set("used", json!(95)).unwrap();
    bus.flush().unwrap();
    assert_eq!(*grew.lock().unwrap(), vec![json!(60), json!(95)]);
    assert_eq!(storage.variable("alerts").unwrap(), json!(2));

    let probe = probes.probe("demo.Storage.writes").unwrap();
    probe.intercept("Volume", "write", &[], || Ok(true)).unwrap();
    bus.flush().unwrap();
    assert_eq!(writes.load(Ordering::SeqCst), 1);

    // the sweep resets usage, a 100% move
    assert_eq!(scheduler.fire_all().unwrap(), 1);
    bus.flush().unwrap();
    assert_eq!(disk.get("used").unwrap(), json!(0));
    assert_eq!(grew.lock().unwrap().len(), 3);

    storage.pause();
    disk.set("used", json!(99)).unwrap();
    probe.intercept("Volume", "write", &[], || Ok(true)).unwrap();
    bus.flush().unwrap();
    assert_eq!(scheduler.fire_all().unwrap(), 0);
    assert_eq!(grew.lock().unwrap().len(), 3);
    assert_eq!(writes.load(Ordering::SeqCst), 1);

    storage.resume();
    assert_eq!(scheduler.fire_all().unwrap(), 1);
    assert!(policy.is_empty(), "{:?}", policy.failures());
}

#[test]
fn handler_failures_reach_the_policy() {
    let input = TempDir::new().unwrap();
    write_trees(input.path());
    let compiler = Compiler::new(CompilerConfig {
        input_dir: input.path().to_path_buf(),
        ..CompilerConfig::default()
    });
    let (types, _) = compiler.lower().unwrap();

    let bus = LocalBus::new();
    let policy = CapturingPolicy::new();
    let context = RuntimeContext::local()
        .with_bus(bus.clone())
        .with_probes(BusProbeFactory::new(bus.clone()))
        .with_policy(policy.clone());
    let bindings = Bindings::new()
        .value("disk.size", || Ok(json!(1)))
        .code("demo.Storage", 0, |monitor| monitor.subscribe("grew", "onGrew"));

    let linked = Linker::new(context, bindings).link_all(&types).unwrap();
    linked.namespaces["disk"].set("used", json!(99)).unwrap();
    bus.flush().unwrap();

    let failures = policy.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].site, "demo.Storage.onGrew");
    assert_eq!(failures[0].message, "no binding for 'demo.Storage.onGrew'");
}

#[test]
fn out_of_range_changes_are_rejected_without_stopping_delivery() {
    let input = TempDir::new().unwrap();
    write_trees(input.path());
    let compiler = Compiler::new(CompilerConfig {
        input_dir: input.path().to_path_buf(),
        ..CompilerConfig::default()
    });
    let (types, _) = compiler.lower().unwrap();

    let bus = LocalBus::new();
    let policy = CapturingPolicy::new();
    let context = RuntimeContext::local()
        .with_bus(bus.clone())
        .with_probes(BusProbeFactory::new(bus.clone()))
        .with_policy(policy.clone());
    let grew = Arc::new(Mutex::new(Vec::new()));
    let bindings = {
        let grew = Arc::clone(&grew);
        Bindings::new()
            .value("disk.size", || Ok(json!(1)))
            .code("demo.Storage", 0, |monitor| monitor.subscribe("grew", "onGrew"))
            .handler("demo.Storage", "onGrew", move |_, event| {
                if let Event::Change(change) = event {
                    grew.lock().unwrap().push(change.current.clone());
                }
                Ok(())
            })
    };
    let linked = Linker::new(context, bindings).link_all(&types).unwrap();
    let disk = &linked.namespaces["disk"];

    let max = "79228162514264337593543950335";
    let min = "-79228162514264337593543950335";
    // above 90
    disk.set("used", json!(max)).unwrap();
    // the percentage leaf overflows on both of these
    disk.set("used", json!(min)).unwrap();
    disk.set("used", json!(3)).unwrap();
    // 3 -> 95: above 90
    disk.set("used", json!(95)).unwrap();
    bus.flush().unwrap();

    assert_eq!(*grew.lock().unwrap(), vec![json!(max), json!(95)]);
    assert!(policy.is_empty(), "{:?}", policy.failures());
}
