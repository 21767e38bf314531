//! Cold-path constant lookup.
//!
//! Each walk reads a table's "constants unmodified" token before reading its entries and
//! records it in the result's guards when the name is not there. On a hit the entry's own
//! token is recorded instead. The starting module's token is read before its ancestry is
//! computed, so an `include` anywhere up the chain also invalidates the answer.

use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::runner::ds::constant::{ConstantEntry, Visibility};
use crate::runner::ds::error::Result;
use crate::runner::ds::lex_env::LexicalScope;
use crate::runner::ds::module::ModuleId;
use crate::runner::ds::namespace::Namespace;
use crate::runner::ds::token::Guards;
use crate::runner::eval::types::{ConstantLookupResult, LookupOrigin, LookupStart};

pub fn lookup_local(ns: &Namespace, module: ModuleId, name: &str) -> Result<ConstantLookupResult> {
    let module = ns.module(module)?;
    let token = module.constants().unmodified_token();
    let mut guards = Guards::new();
    match module.constants().lookup_local(name) {
        Some(entry) => {
            guards.push(entry.token().clone());
            Ok(ConstantLookupResult::found(
                entry,
                LookupOrigin::Ancestor { index: 0 },
                guards,
            ))
        }
        None => {
            guards.push(token);
            Ok(ConstantLookupResult::not_found(guards))
        }
    }
}

/// Walks `start`'s ancestry, then, if `include_root` is set and `start` is not a class,
/// the ancestry of `Object`.
pub fn lookup_in_ancestry(
    ns: &Namespace,
    start: ModuleId,
    name: &str,
    include_root: bool,
) -> Result<ConstantLookupResult> {
    let mut guards = Guards::new();
    let mut walked = FxHashSet::default();
    if let Some((entry, origin)) = walk_ancestry(ns, start, name, &mut guards, &mut walked, |index| {
        LookupOrigin::Ancestor { index }
    })? {
        return Ok(ConstantLookupResult::found(entry, origin, guards));
    }
    if include_root && !ns.is_class(start)? {
        return finish_with_root(ns, name, guards, walked);
    }
    Ok(ConstantLookupResult::not_found(guards))
}

/// Bare-name lookup: enclosing module bodies (own tables only), then the ancestry of the
/// innermost one, then `Object` when the innermost one is not a class.
pub fn lookup_with_lexical_scope(
    ns: &Namespace,
    scope: &LexicalScope,
    name: &str,
) -> Result<ConstantLookupResult> {
    let mut guards = Guards::new();
    for (depth, id) in scope.enclosing_modules().into_iter().enumerate() {
        let module = ns.module(id)?;
        let token = module.constants().unmodified_token();
        if let Some(entry) = module.constants().lookup_local(name) {
            guards.push(entry.token().clone());
            return Ok(ConstantLookupResult::found(
                entry,
                LookupOrigin::Lexical { depth },
                guards,
            ));
        }
        guards.push(token);
    }

    let live = scope.live_module();
    let mut walked = FxHashSet::default();
    if let Some((entry, origin)) = walk_ancestry(ns, live, name, &mut guards, &mut walked, |index| {
        LookupOrigin::Ancestor { index }
    })? {
        return Ok(ConstantLookupResult::found(entry, origin, guards));
    }
    if !ns.is_class(live)? {
        return finish_with_root(ns, name, guards, walked);
    }
    Ok(ConstantLookupResult::not_found(guards))
}

fn finish_with_root(
    ns: &Namespace,
    name: &str,
    mut guards: Guards,
    mut walked: FxHashSet<ModuleId>,
) -> Result<ConstantLookupResult> {
    match walk_ancestry(ns, ns.object(), name, &mut guards, &mut walked, |index| {
        LookupOrigin::Root { index }
    })? {
        Some((entry, origin)) => Ok(ConstantLookupResult::found(entry, origin, guards)),
        None => Ok(ConstantLookupResult::not_found(guards)),
    }
}

fn walk_ancestry<F>(
    ns: &Namespace,
    start: ModuleId,
    name: &str,
    guards: &mut Guards,
    walked: &mut FxHashSet<ModuleId>,
    origin: F,
) -> Result<Option<(Arc<ConstantEntry>, LookupOrigin)>>
where
    F: Fn(usize) -> LookupOrigin,
{
    let start_token = ns.module(start)?.constants().unmodified_token();
    let ancestors = ns.ancestors(start)?;
    for (index, id) in ancestors.into_iter().enumerate() {
        if !walked.insert(id) {
            continue;
        }
        let module = ns.module(id)?;
        let token = if index == 0 {
            start_token.clone()
        } else {
            module.constants().unmodified_token()
        };
        if let Some(entry) = module.constants().lookup_local(name) {
            guards.push(entry.token().clone());
            return Ok(Some((entry, origin(index))));
        }
        guards.push(token);
    }
    Ok(None)
}

/// Runs the lookup a `start` describes.
pub fn lookup(ns: &Namespace, start: &LookupStart<'_>, name: &str) -> Result<ConstantLookupResult> {
    match start {
        LookupStart::Module { module, options } if options.inherit => {
            lookup_in_ancestry(ns, *module, name, options.include_root)
        }
        LookupStart::Module { module, .. } => lookup_local(ns, *module, name),
        LookupStart::Lexical(scope) => lookup_with_lexical_scope(ns, scope, name),
    }
}

/// Visibility verdict. A private constant is visible to code lexically inside its
/// declaring module, to code whose live module inherits it, and everywhere for private
/// constants of `Object`. A qualified `M::X` reference has no lexical position and never
/// sees private constants.
pub fn is_visible(ns: &Namespace, entry: &ConstantEntry, start: &LookupStart<'_>) -> Result<bool> {
    if entry.visibility() == Visibility::Public || start.ignores_visibility() {
        return Ok(true);
    }
    let scope = match start.scope() {
        Some(scope) => scope,
        None => return Ok(false),
    };
    let declaring = entry.declaring_module();
    if declaring == ns.object() || scope.encloses(declaring) {
        return Ok(true);
    }
    Ok(ns.ancestors(scope.live_module())?.contains(&declaring))
}
