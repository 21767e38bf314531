extern crate autoconst;

use std::cell::RefCell;
use std::sync::Arc;

use autoconst::runner::ds::error::ConstantError;
use autoconst::runner::ds::value::Value;
use autoconst::runner::engine::ConstantEngine;
use autoconst::runner::eval::ExplicitModuleSite;
use autoconst::runner::plugin::{FeatureRegistry, RecordingWarningSink};

fn engine_with_sink() -> (ConstantEngine, Arc<RecordingWarningSink>) {
    let sink = Arc::new(RecordingWarningSink::new());
    let engine = ConstantEngine::new().with_warning_sink(sink.clone());
    (engine, sink)
}

// ── Conditional assignment ───────────────────────────────────────────

#[test]
fn test_or_assign_evaluates_module_then_rhs() {
    let engine = ConstantEngine::new();
    let module = engine.define_module(engine.object_class(), "Settings").unwrap();
    let order = RefCell::new(Vec::new());

    let value = engine
        .or_assign_scoped(
            |_| {
                order.borrow_mut().push("module");
                Ok(module)
            },
            "MODE",
            |_| {
                order.borrow_mut().push("rhs");
                Ok(Value::symbol("fast"))
            },
        )
        .unwrap();
    assert_eq!(value, Value::symbol("fast"));
    assert_eq!(*order.borrow(), vec!["module", "rhs"]);

    order.borrow_mut().clear();
    let value = engine
        .or_assign_scoped(
            |_| {
                order.borrow_mut().push("module");
                Ok(module)
            },
            "MODE",
            |_| {
                order.borrow_mut().push("rhs");
                Ok(Value::symbol("slow"))
            },
        )
        .unwrap();
    assert_eq!(value, Value::symbol("fast"));
    assert_eq!(*order.borrow(), vec!["module"]);
}

#[test]
fn test_or_assign_replaces_falsy_value() {
    let (engine, sink) = engine_with_sink();
    let object = engine.object_class();
    engine.write(object, "FLAG", Value::Boolean(false)).unwrap();
    let value = engine.or_assign(object, "FLAG", |_| Ok(Value::Integer(1))).unwrap();
    assert_eq!(value, Value::Integer(1));
    assert_eq!(engine.resolve(object, "FLAG", true, false).unwrap(), Some(Value::Integer(1)));
    assert_eq!(sink.messages(), vec!["already initialized constant FLAG"]);

    engine.write(object, "EMPTY", Value::Nil).unwrap();
    assert_eq!(
        engine.or_assign(object, "EMPTY", |_| Ok(Value::from("set"))).unwrap(),
        Value::from("set")
    );
}

#[test]
fn test_or_assign_keeps_zero_and_empty_string() {
    let engine = ConstantEngine::new();
    let object = engine.object_class();
    engine.write(object, "ZERO", Value::Integer(0)).unwrap();
    engine.write(object, "BLANK", Value::from("")).unwrap();
    let mut ran = 0;
    for name in &["ZERO", "BLANK"] {
        engine
            .or_assign(object, name, |_| {
                ran += 1;
                Ok(Value::Nil)
            })
            .unwrap();
    }
    assert_eq!(ran, 0);
}

#[test]
fn test_or_assign_on_private_constant_fails() {
    let engine = ConstantEngine::new();
    let module = engine.define_module(engine.object_class(), "Vault").unwrap();
    engine.write(module, "KEY", Value::Integer(1)).unwrap();
    engine.private_constant(module, &["KEY"]).unwrap();

    let mut ran = false;
    let err = engine
        .or_assign(module, "KEY", |_| {
            ran = true;
            Ok(Value::Integer(2))
        })
        .unwrap_err();
    assert!(err.is_private_constant());
    assert!(!ran);
}

#[test]
fn test_or_assign_module_error_skips_rhs() {
    let engine = ConstantEngine::new();
    let mut ran = false;
    let err = engine
        .or_assign_scoped(
            |_| Err(ConstantError::raised("NoMethodError", "undefined method")),
            "X",
            |_| {
                ran = true;
                Ok(Value::Nil)
            },
        )
        .unwrap_err();
    assert_eq!(err.to_string(), "NoMethodError: undefined method");
    assert!(!ran);
}

#[test]
fn test_or_assign_runs_autoload() {
    let registry = Arc::new(FeatureRegistry::new());
    let engine = ConstantEngine::new().with_loader(registry.clone());
    let object = engine.object_class();
    registry.register("cfg", move |engine| {
        engine.write(object, "Cfg", Value::from("loaded"))?;
        Ok(())
    });
    engine.declare_autoload(object, "Cfg", "cfg").unwrap();

    let value = engine.or_assign(object, "Cfg", |_| Ok(Value::from("fallback"))).unwrap();
    assert_eq!(value, Value::from("loaded"));
    assert_eq!(registry.execution_count("cfg"), 1);
}

#[test]
fn test_or_assign_rejects_bad_name() {
    let engine = ConstantEngine::new();
    let err = engine
        .or_assign(engine.object_class(), "nope", |_| Ok(Value::Nil))
        .unwrap_err();
    assert!(err.is_name_error());
}

// ── const_get / const_defined ────────────────────────────────────────

#[test]
fn test_const_get_walks_paths() {
    let engine = ConstantEngine::new();
    let object = engine.object_class();
    let outer = engine.define_module(object, "Outer").unwrap();
    let inner = engine.define_module(outer, "Inner").unwrap();
    engine.write(inner, "DEPTH", Value::Integer(2)).unwrap();
    engine.write(object, "TOP", Value::Integer(0)).unwrap();

    assert_eq!(engine.const_get(object, "Outer::Inner::DEPTH", true).unwrap(), Value::Integer(2));
    assert_eq!(engine.const_get(inner, "DEPTH", false).unwrap(), Value::Integer(2));
    assert_eq!(engine.const_get(inner, "::TOP", true).unwrap(), Value::Integer(0));
    assert_eq!(engine.const_get(outer, "Inner", true).unwrap(), Value::Module(inner));
}

#[test]
fn test_const_get_errors() {
    let engine = ConstantEngine::new();
    let object = engine.object_class();
    let base = engine.define_class(object, "Base", None).unwrap();
    let derived = engine.define_class(object, "Derived", Some(base)).unwrap();
    engine.write(base, "LIMIT", Value::Integer(3)).unwrap();
    engine.write(object, "Plain", Value::Integer(1)).unwrap();

    assert_eq!(engine.const_get(derived, "LIMIT", true).unwrap(), Value::Integer(3));
    let err = engine.const_get(derived, "LIMIT", false).unwrap_err();
    assert_eq!(err.to_string(), "uninitialized constant Derived::LIMIT");

    let err = engine.const_get(object, "Plain::X", true).unwrap_err();
    assert_eq!(err.to_string(), "Plain does not refer to class/module");

    let err = engine.const_get(object, "Outer::X", true).unwrap_err();
    assert!(err.is_missing());

    let err = engine.const_get(object, "not::valid", true).unwrap_err();
    assert!(matches!(err, ConstantError::InvalidName { .. }));
}

#[test]
fn test_const_get_ignores_visibility() {
    let engine = ConstantEngine::new();
    let module = engine.define_module(engine.object_class(), "Vault").unwrap();
    engine.write(module, "SECRET", Value::Integer(8)).unwrap();
    engine.private_constant(module, &["SECRET"]).unwrap();
    assert_eq!(
        engine.const_get(engine.object_class(), "Vault::SECRET", true).unwrap(),
        Value::Integer(8)
    );
}

#[test]
fn test_const_defined() {
    let engine = ConstantEngine::new();
    let object = engine.object_class();
    let outer = engine.define_module(object, "Outer").unwrap();
    let base = engine.define_class(object, "Base", None).unwrap();
    let derived = engine.define_class(object, "Derived", Some(base)).unwrap();
    engine.write(outer, "X", Value::Nil).unwrap();
    engine.write(base, "FROM_BASE", Value::Nil).unwrap();
    engine.write(object, "Plain", Value::Integer(1)).unwrap();

    assert!(engine.const_defined(object, "Outer::X", true).unwrap());
    assert!(engine.const_defined(object, "::Outer", true).unwrap());
    assert!(!engine.const_defined(object, "Outer::Y", true).unwrap());
    assert!(!engine.const_defined(object, "Missing::X", true).unwrap());
    assert!(!engine.const_defined(object, "Plain::X", true).unwrap());
    assert!(engine.const_defined(derived, "FROM_BASE", true).unwrap());
    assert!(!engine.const_defined(derived, "FROM_BASE", false).unwrap());
}

// ── const_set / remove_const ─────────────────────────────────────────

#[test]
fn test_const_set_validates_name() {
    let engine = ConstantEngine::new();
    let object = engine.object_class();
    let err = engine.const_set(object, "lower", Value::Nil).unwrap_err();
    assert_eq!(err.to_string(), "wrong constant name lower");
    assert_eq!(engine.const_set(object, "Upper", Value::Integer(1)).unwrap(), Value::Integer(1));
    assert_eq!(engine.const_get(object, "Upper", true).unwrap(), Value::Integer(1));
}

#[test]
fn test_remove_const() {
    let engine = ConstantEngine::new();
    let module = engine.define_module(engine.object_class(), "Box").unwrap();
    engine.write(module, "ITEM", Value::from("thing")).unwrap();
    let site = ExplicitModuleSite::new("ITEM");
    assert_eq!(site.resolve(&engine, module, false).unwrap(), Some(Value::from("thing")));

    assert_eq!(engine.remove_const(module, "ITEM").unwrap(), Some(Value::from("thing")));
    assert_eq!(site.resolve(&engine, module, false).unwrap(), None);

    let err = engine.remove_const(module, "ITEM").unwrap_err();
    assert_eq!(err.to_string(), "constant Box::ITEM not defined");

    engine.declare_autoload(module, "Lazy", "lazy").unwrap();
    assert_eq!(engine.remove_const(module, "Lazy").unwrap(), None);
    assert_eq!(engine.autoload_path(module, "Lazy").unwrap(), None);
}

#[test]
fn test_remove_const_does_not_touch_ancestors() {
    let engine = ConstantEngine::new();
    let object = engine.object_class();
    let base = engine.define_class(object, "Base", None).unwrap();
    let derived = engine.define_class(object, "Derived", Some(base)).unwrap();
    engine.write(base, "SHARED", Value::Integer(1)).unwrap();
    assert!(engine.remove_const(derived, "SHARED").is_err());
    assert_eq!(engine.resolve(derived, "SHARED", true, false).unwrap(), Some(Value::Integer(1)));
}

// ── Visibility, deprecation, listing ─────────────────────────────────

#[test]
fn test_visibility_changes_on_missing_constant_fail() {
    let engine = ConstantEngine::new();
    let module = engine.define_module(engine.object_class(), "M").unwrap();
    engine.write(module, "A", Value::Nil).unwrap();
    let err = engine.private_constant(module, &["A", "B"]).unwrap_err();
    assert_eq!(err.to_string(), "constant M::B not defined");
    assert!(engine.resolve(module, "A", true, false).unwrap_err().is_private_constant());
    assert!(engine.deprecate_constant(module, &["C"]).is_err());
    assert!(engine.public_constant(module, &["D"]).is_err());
}

#[test]
fn test_redefinition_keeps_visibility_and_deprecation() {
    let (engine, sink) = engine_with_sink();
    let module = engine.define_module(engine.object_class(), "M").unwrap();
    engine.write(module, "OLD", Value::Integer(1)).unwrap();
    engine.private_constant(module, &["OLD"]).unwrap();
    engine.deprecate_constant(module, &["OLD"]).unwrap();
    engine.write(module, "OLD", Value::Integer(2)).unwrap();

    assert!(engine.resolve(module, "OLD", true, false).unwrap_err().is_private_constant());
    sink.clear();
    let inside = engine.root_scope().nest(module);
    assert_eq!(engine.resolve_lexical(&inside, "OLD", false).unwrap(), Some(Value::Integer(2)));
    assert_eq!(sink.messages(), vec!["constant M::OLD is deprecated"]);
}

#[test]
fn test_constants_listing() {
    let engine = ConstantEngine::new();
    let object = engine.object_class();
    let mixin = engine.define_module(object, "Mixin").unwrap();
    let base = engine.define_class(object, "Base", None).unwrap();
    let derived = engine.define_class(object, "Derived", Some(base)).unwrap();
    engine.include_module(derived, mixin).unwrap();
    engine.write(base, "B_TWO", Value::Nil).unwrap();
    engine.write(base, "B_ONE", Value::Nil).unwrap();
    engine.write(base, "HIDDEN", Value::Nil).unwrap();
    engine.private_constant(base, &["HIDDEN"]).unwrap();
    engine.write(mixin, "MIXED", Value::Nil).unwrap();
    engine.write(derived, "OWN", Value::Nil).unwrap();
    engine.write(derived, "B_ONE", Value::Nil).unwrap();

    assert_eq!(engine.constants(derived, false).unwrap(), vec!["B_ONE", "OWN"]);
    assert_eq!(
        engine.constants(derived, true).unwrap(),
        vec!["B_ONE", "OWN", "MIXED", "B_TWO"]
    );
    assert!(engine.constants(object, true).unwrap().contains(&"Derived".to_string()));
}
