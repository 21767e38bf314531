extern crate autoconst;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use autoconst::runner::ds::error::{ConstantError, Result};
use autoconst::runner::ds::value::Value;
use autoconst::runner::engine::ConstantEngine;
use autoconst::runner::eval::ExplicitModuleSite;
use autoconst::runner::plugin::{EngineConfig, FeatureLoader, FeatureRegistry};

fn engine_with_registry() -> (Arc<ConstantEngine>, Arc<FeatureRegistry>) {
    let registry = Arc::new(FeatureRegistry::new());
    let engine = ConstantEngine::with_config(EngineConfig::new().with_log_autoload(true))
        .with_loader(registry.clone());
    (Arc::new(engine), registry)
}

// ── Basic loading ────────────────────────────────────────────────────

#[test]
fn test_autoload_runs_feature_once() {
    let (engine, registry) = engine_with_registry();
    let m = engine.define_module(engine.object_class(), "M").unwrap();
    registry.register("helper_feature", move |engine| {
        engine.write(m, "Helper", Value::from("X"))?;
        Ok(())
    });
    engine.declare_autoload(m, "Helper", "helper_feature").unwrap();
    assert_eq!(
        engine.autoload_path(m, "Helper").unwrap().as_deref(),
        Some("helper_feature")
    );

    assert_eq!(engine.resolve(m, "Helper", true, true).unwrap(), Some(Value::from("X")));
    assert_eq!(engine.resolve(m, "Helper", true, true).unwrap(), Some(Value::from("X")));
    assert_eq!(registry.execution_count("helper_feature"), 1);
    assert!(registry.is_loaded("helper_feature"));
    assert_eq!(engine.autoload_path(m, "Helper").unwrap(), None);
}

#[test]
fn test_concurrent_read_during_load_is_missing() {
    let (engine, registry) = engine_with_registry();
    let m = engine.define_module(engine.object_class(), "M").unwrap();
    let barrier = Arc::new(Barrier::new(2));
    {
        let barrier = barrier.clone();
        registry.register("helper_feature", move |engine| {
            // Let the other thread read while the load is in progress.
            barrier.wait();
            barrier.wait();
            engine.write(m, "Helper", Value::from("X"))?;
            Ok(())
        });
    }
    engine.declare_autoload(m, "Helper", "helper_feature").unwrap();

    let loader = {
        let engine = engine.clone();
        thread::spawn(move || engine.resolve(m, "Helper", true, true).unwrap())
    };
    barrier.wait();
    assert_eq!(engine.resolve(m, "Helper", true, false).unwrap(), None);
    let err = engine.resolve(m, "Helper", true, true).unwrap_err();
    assert!(err.is_missing());
    assert_eq!(err.to_string(), "uninitialized constant M::Helper");
    // Nothing to report: the other thread owns the load.
    assert_eq!(engine.autoload_path(m, "Helper").unwrap().as_deref(), Some("helper_feature"));
    barrier.wait();

    assert_eq!(loader.join().unwrap(), Some(Value::from("X")));
    assert_eq!(engine.resolve(m, "Helper", true, false).unwrap(), Some(Value::from("X")));
    assert_eq!(registry.execution_count("helper_feature"), 1);
}

#[test]
fn test_many_threads_load_exactly_once() {
    let (engine, registry) = engine_with_registry();
    let object = engine.object_class();
    registry.register("shared.rb", move |engine| {
        engine.write(object, "Shared", Value::Integer(7))?;
        Ok(())
    });
    engine.declare_autoload(object, "Shared", "shared").unwrap();

    let start = Arc::new(Barrier::new(8));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = engine.clone();
            let start = start.clone();
            thread::spawn(move || {
                start.wait();
                engine.resolve(object, "Shared", true, false).unwrap()
            })
        })
        .collect();
    for handle in handles {
        let seen = handle.join().unwrap();
        assert!(seen.is_none() || seen == Some(Value::Integer(7)), "saw {:?}", seen);
    }
    assert_eq!(registry.execution_count("shared"), 1);
    assert_eq!(engine.resolve(object, "Shared", true, false).unwrap(), Some(Value::Integer(7)));
}

#[test]
fn test_autoload_through_ancestry() {
    let (engine, registry) = engine_with_registry();
    let object = engine.object_class();
    let base = engine.define_class(object, "Base", None).unwrap();
    let derived = engine.define_class(object, "Derived", Some(base)).unwrap();
    registry.register("base/parts", move |engine| {
        engine.write(base, "Parts", Value::symbol("parts"))?;
        Ok(())
    });
    engine.declare_autoload(base, "Parts", "base/parts").unwrap();

    assert_eq!(engine.autoload_path(derived, "Parts").unwrap().as_deref(), Some("base/parts"));
    assert_eq!(
        engine.resolve(derived, "Parts", true, false).unwrap(),
        Some(Value::symbol("parts"))
    );
}

#[test]
fn test_site_autoloads_through_cached_entry() {
    let (engine, registry) = engine_with_registry();
    let object = engine.object_class();
    registry.register("lazy", move |engine| {
        engine.write(object, "Lazy", Value::Integer(1))?;
        Ok(())
    });
    engine.declare_autoload(object, "Lazy", "lazy").unwrap();

    let site = ExplicitModuleSite::new("Lazy");
    for _ in 0..3 {
        assert_eq!(site.resolve(&engine, object, false).unwrap(), Some(Value::Integer(1)));
    }
    assert_eq!(registry.execution_count("lazy"), 1);
}

#[test]
fn test_reopening_autoloaded_module_loads_it() {
    let (engine, registry) = engine_with_registry();
    let object = engine.object_class();
    registry.register("tools", move |engine| {
        let tools = engine.define_module(object, "Tools")?;
        engine.write(tools, "READY", Value::Boolean(true))?;
        Ok(())
    });
    engine.declare_autoload(object, "Tools", "tools").unwrap();

    let tools = engine.define_module(object, "Tools").unwrap();
    assert_eq!(engine.module_name(tools), "Tools");
    assert_eq!(engine.resolve(tools, "READY", true, false).unwrap(), Some(Value::Boolean(true)));
    assert_eq!(registry.execution_count("tools"), 1);
}

// ── Reentrancy ───────────────────────────────────────────────────────

#[test]
fn test_self_reference_during_load() {
    let (engine, registry) = engine_with_registry();
    let object = engine.object_class();
    let observed = Arc::new(Mutex::new(Vec::new()));
    {
        let observed = observed.clone();
        registry.register("node", move |engine| {
            let before = engine.resolve(object, "Node", true, false)?;
            engine.write(object, "Node", Value::from("node"))?;
            let after = engine.resolve(object, "Node", true, false)?;
            let path = engine.autoload_path(object, "Node")?;
            observed.lock().unwrap().push((before, after, path));
            Ok(())
        });
    }
    engine.declare_autoload(object, "Node", "node").unwrap();

    assert_eq!(engine.resolve(object, "Node", true, false).unwrap(), Some(Value::from("node")));
    let observed = observed.lock().unwrap();
    assert_eq!(
        *observed,
        vec![(None, Some(Value::from("node")), None)]
    );
}

#[test]
fn test_is_defined_during_load_follows_parked_value() {
    let (engine, registry) = engine_with_registry();
    let object = engine.object_class();
    let observed = Arc::new(Mutex::new(Vec::new()));
    {
        let observed = observed.clone();
        registry.register("leaf", move |engine| {
            let before = engine.is_defined(object, "Leaf")?;
            engine.write(object, "Leaf", Value::Integer(1))?;
            let after = engine.is_defined(object, "Leaf")?;
            observed.lock().unwrap().push((before, after));
            Ok(())
        });
    }
    engine.declare_autoload(object, "Leaf", "leaf").unwrap();

    assert_eq!(engine.resolve(object, "Leaf", true, false).unwrap(), Some(Value::Integer(1)));
    assert_eq!(*observed.lock().unwrap(), vec![(false, true)]);
}

#[test]
fn test_self_reference_during_load_raises_missing() {
    let (engine, registry) = engine_with_registry();
    let object = engine.object_class();
    let nested = Arc::new(Mutex::new(None));
    {
        let nested = nested.clone();
        registry.register("k", move |engine| {
            let err = engine.resolve(object, "K", true, true).unwrap_err();
            *nested.lock().unwrap() = Some(err.is_missing());
            engine.write(object, "K", Value::Integer(1))?;
            Ok(())
        });
    }
    engine.declare_autoload(object, "K", "k").unwrap();

    assert_eq!(engine.resolve(object, "K", true, true).unwrap(), Some(Value::Integer(1)));
    assert_eq!(*nested.lock().unwrap(), Some(true));
}

#[test]
fn test_circular_require_terminates() {
    let (engine, registry) = engine_with_registry();
    let object = engine.object_class();
    let seen_b = Arc::new(Mutex::new(None));
    {
        let seen_b = seen_b.clone();
        registry.register("cycle", move |engine| {
            // B autoloads from the feature being required right now.
            *seen_b.lock().unwrap() = Some(engine.resolve(object, "B", true, false)?);
            engine.write(object, "A", Value::from("a"))?;
            engine.write(object, "B", Value::from("b"))?;
            Ok(())
        });
    }
    engine.declare_autoload(object, "A", "cycle").unwrap();
    engine.declare_autoload(object, "B", "cycle").unwrap();

    assert_eq!(engine.resolve(object, "A", true, false).unwrap(), Some(Value::from("a")));
    assert_eq!(*seen_b.lock().unwrap(), Some(None));
    assert_eq!(engine.resolve(object, "B", true, false).unwrap(), Some(Value::from("b")));
    assert_eq!(registry.execution_count("cycle"), 1);
}

// ── Failures ─────────────────────────────────────────────────────────

#[test]
fn test_failed_load_can_be_retried() {
    let (engine, registry) = engine_with_registry();
    let object = engine.object_class();
    let failed_once = Arc::new(AtomicBool::new(false));
    {
        let failed_once = failed_once.clone();
        registry.register("flaky", move |engine| {
            if !failed_once.swap(true, Ordering::SeqCst) {
                return Err(ConstantError::raised("RuntimeError", "boom"));
            }
            engine.write(object, "Flaky", Value::Integer(2))?;
            Ok(())
        });
    }
    engine.declare_autoload(object, "Flaky", "flaky").unwrap();

    let err = engine.resolve(object, "Flaky", true, false).unwrap_err();
    match &err {
        ConstantError::AutoloadFailure { qualified, path, source } => {
            assert_eq!(qualified, "Flaky");
            assert_eq!(path, "flaky");
            assert_eq!(source.to_string(), "RuntimeError: boom");
        }
        other => panic!("expected AutoloadFailure, got {:?}", other),
    }
    assert!(std::error::Error::source(&err).is_some());
    assert_eq!(engine.autoload_path(object, "Flaky").unwrap().as_deref(), Some("flaky"));
    assert!(!registry.is_loaded("flaky"));

    assert_eq!(engine.resolve(object, "Flaky", true, false).unwrap(), Some(Value::Integer(2)));
    assert_eq!(registry.execution_count("flaky"), 2);
}

#[test]
fn test_unknown_feature_is_load_error() {
    let (engine, _registry) = engine_with_registry();
    let object = engine.object_class();
    engine.declare_autoload(object, "Nowhere", "nowhere").unwrap();
    let err = engine.resolve(object, "Nowhere", true, false).unwrap_err();
    assert_eq!(
        err.to_string(),
        "autoload of Nowhere from nowhere failed: cannot load such file -- nowhere"
    );
    assert!(engine.resolve(object, "Nowhere", true, false).is_err());
}

#[test]
fn test_feature_that_does_not_define_constant() {
    let (engine, registry) = engine_with_registry();
    let object = engine.object_class();
    registry.register("empty", |_| Ok(()));
    engine.declare_autoload(object, "Ghost", "empty").unwrap();

    assert_eq!(engine.resolve(object, "Ghost", true, false).unwrap(), None);
    assert_eq!(engine.autoload_path(object, "Ghost").unwrap(), None);
    assert!(!engine.is_defined(object, "Ghost").unwrap());
    assert!(engine.resolve(object, "Ghost", true, true).unwrap_err().is_missing());
    assert_eq!(registry.execution_count("empty"), 1);

    // The name can still be bound normally afterwards.
    engine.write(object, "Ghost", Value::Integer(3)).unwrap();
    assert_eq!(engine.resolve(object, "Ghost", true, false).unwrap(), Some(Value::Integer(3)));
}

/// Loads nothing and counts how often it was asked to.
struct CountingLoader {
    calls: AtomicUsize,
}

impl FeatureLoader for CountingLoader {
    fn require(&self, _engine: &ConstantEngine, _path: &str) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        thread::sleep(std::time::Duration::from_millis(1));
        Ok(true)
    }

    fn is_current_thread_holding_lock(&self, _path: &str) -> bool {
        false
    }

    fn find_feature(&self, path: &str) -> Option<String> {
        Some(path.to_string())
    }
}

#[test]
fn test_feature_defining_nothing_is_required_once_under_contention() {
    for _ in 0..50 {
        let loader = Arc::new(CountingLoader {
            calls: AtomicUsize::new(0),
        });
        let engine = Arc::new(ConstantEngine::new().with_loader(loader.clone()));
        let object = engine.object_class();
        engine.declare_autoload(object, "Helper", "helper").unwrap();

        let start = Arc::new(Barrier::new(6));
        let readers: Vec<_> = (0..6)
            .map(|_| {
                let engine = engine.clone();
                let start = start.clone();
                thread::spawn(move || {
                    start.wait();
                    for _ in 0..200 {
                        assert_eq!(engine.resolve(object, "Helper", true, false).unwrap(), None);
                    }
                })
            })
            .collect();
        for reader in readers {
            reader.join().unwrap();
        }

        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
        assert!(!engine.is_defined(object, "Helper").unwrap());
        assert_eq!(engine.autoload_path(object, "Helper").unwrap(), None);
    }
}

// ── Declaration ──────────────────────────────────────────────────────

#[test]
fn test_declare_autoload_validation() {
    let (engine, _registry) = engine_with_registry();
    let object = engine.object_class();
    let err = engine.declare_autoload(object, "lower", "x").unwrap_err();
    assert_eq!(err.to_string(), "autoload must be constant name: lower");
    let err = engine.declare_autoload(object, "Fine", "").unwrap_err();
    assert!(matches!(err, ConstantError::EmptyAutoloadPath));
}

#[test]
fn test_declare_autoload_over_existing_binding_is_noop() {
    let (engine, registry) = engine_with_registry();
    let object = engine.object_class();
    registry.register("never", |_| Err(ConstantError::raised("RuntimeError", "ran")));
    engine.write(object, "Bound", Value::Integer(1)).unwrap();
    engine.declare_autoload(object, "Bound", "never").unwrap();

    assert_eq!(engine.autoload_path(object, "Bound").unwrap(), None);
    assert_eq!(engine.resolve(object, "Bound", true, false).unwrap(), Some(Value::Integer(1)));
    assert_eq!(registry.execution_count("never"), 0);
}

#[test]
fn test_autoload_entry_counts_as_defined() {
    let (engine, registry) = engine_with_registry();
    let object = engine.object_class();
    registry.register("later", |_| Ok(()));
    engine.declare_autoload(object, "Later", "later").unwrap();
    assert!(engine.is_defined(object, "Later").unwrap());
    assert!(engine.const_defined(object, "Later", true).unwrap());
    assert_eq!(registry.execution_count("later"), 0);
}
