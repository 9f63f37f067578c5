//! Class and module registration.
//!
//! A [`ForeignModule`] owns the classes a module exposes; a [`ForeignKlass`]
//! owns one class's allocate hook and method table. [`KlassBuilder`] is the
//! fluent registration surface. Besides the trampolines, every registered
//! member contributes a declaration stub line, and [`ForeignModule::source`]
//! renders the module source the VM's compiler must see before foreign
//! members can bind.
//!
//! Method tables key on the full signature plus staticness. Re-registering
//! the same key overwrites the body, so the last registration wins.

use std::any::Any;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::bind::{ForeignCtor, ForeignMethod, ForeignStaticFn, TrampolineFn};
use crate::error::{BindError, CastError};
use crate::foreign::{Foreign, ForeignObject, ForeignType, Shared};
use crate::operator::Operator;
use crate::registry::{TypeRegistry, UpcastFn};
use crate::type_hash::TypeHash;

/// One bound member: signature, staticness, stub line, body.
pub(crate) struct KlassMethod {
    pub signature: String,
    pub is_static: bool,
    pub declaration: String,
    pub trampoline: TrampolineFn,
}

/// The allocate hook and its stub line.
pub(crate) struct KlassCtor {
    pub signature: String,
    pub declaration: String,
    pub trampoline: TrampolineFn,
}

/// One registered script class.
pub struct ForeignKlass {
    name: String,
    pub(crate) ctor: Option<KlassCtor>,
    pub(crate) methods: Vec<KlassMethod>,
}

impl ForeignKlass {
    fn new(name: &str) -> Self {
        ForeignKlass {
            name: name.to_string(),
            ctor: None,
            methods: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn find_method(&self, signature: &str, is_static: bool) -> Option<&KlassMethod> {
        self.methods
            .iter()
            .find(|m| m.signature == signature && m.is_static == is_static)
    }

    fn insert_method(
        &mut self,
        signature: String,
        is_static: bool,
        declaration: String,
        trampoline: TrampolineFn,
    ) {
        if let Some(existing) = self
            .methods
            .iter_mut()
            .find(|m| m.signature == signature && m.is_static == is_static)
        {
            existing.declaration = declaration;
            existing.trampoline = trampoline;
        } else {
            self.methods.push(KlassMethod {
                signature,
                is_static,
                declaration,
                trampoline,
            });
        }
    }

    /// Render the class declaration stub.
    pub fn generate(&self, out: &mut String) {
        out.push_str("foreign class ");
        out.push_str(&self.name);
        out.push_str(" {\n");
        if let Some(ctor) = &self.ctor {
            out.push_str("    ");
            out.push_str(&ctor.declaration);
            out.push('\n');
        }
        for method in &self.methods {
            out.push_str("    ");
            out.push_str(&method.declaration);
            out.push('\n');
        }
        out.push_str("}\n");
    }
}

/// The classes one module exposes, plus source synthesis over them.
pub struct ForeignModule {
    name: String,
    klasses: Vec<ForeignKlass>,
}

impl ForeignModule {
    pub(crate) fn new(name: &str) -> Self {
        ForeignModule {
            name: name.to_string(),
            klasses: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn find_klass(&self, name: &str) -> Option<&ForeignKlass> {
        self.klasses.iter().find(|k| k.name == name)
    }

    /// Concatenated declaration stubs for every class, in registration order.
    pub fn source(&self) -> String {
        let mut out = String::new();
        for klass in &self.klasses {
            klass.generate(&mut out);
        }
        out
    }

    /// Content key over [`source`](Self::source), for compile-skip checks.
    pub fn source_hash(&self) -> TypeHash {
        TypeHash::from_source(&self.source())
    }
}

/// Registration surface for one module.
pub struct ModuleBuilder<'a> {
    pub(crate) module: &'a mut ForeignModule,
    pub(crate) registry: &'a mut TypeRegistry,
}

impl<'a> ModuleBuilder<'a> {
    /// Register a native type as a script class and open its builder.
    /// Registering the same native type twice is rejected.
    pub fn klass<T: ForeignType + ?Sized>(
        &mut self,
        name: &str,
    ) -> Result<KlassBuilder<'_, T>, BindError> {
        self.registry.register_class(
            TypeHash::of::<T>(),
            std::any::type_name::<T>(),
            &self.module.name,
            name,
        )?;
        let klasses = &mut self.module.klasses;
        let pos = match klasses.iter().position(|k| k.name == name) {
            Some(pos) => pos,
            None => {
                klasses.push(ForeignKlass::new(name));
                klasses.len() - 1
            }
        };
        let klass = &mut klasses[pos];
        Ok(KlassBuilder {
            klass,
            registry: &mut *self.registry,
            marker: PhantomData,
        })
    }
}

fn call_signature(name: &str, arity: usize) -> String {
    let mut sig = String::from(name);
    sig.push('(');
    for i in 0..arity {
        if i > 0 {
            sig.push(',');
        }
        sig.push('_');
    }
    sig.push(')');
    sig
}

fn call_declaration(prefix: &str, name: &str, arity: usize) -> String {
    let mut decl = String::from(prefix);
    decl.push_str(name);
    decl.push('(');
    for i in 0..arity {
        if i > 0 {
            decl.push_str(", ");
        }
        decl.push_str("arg");
        decl.push_str(&i.to_string());
    }
    decl.push(')');
    decl
}

/// Fluent builder for one class.
pub struct KlassBuilder<'a, T: ForeignType + ?Sized> {
    klass: &'a mut ForeignKlass,
    registry: &'a mut TypeRegistry,
    marker: PhantomData<T>,
}

impl<'a, T: ForeignType + ?Sized> KlassBuilder<'a, T> {
    /// Bind the constructor. Its trampoline becomes the allocate hook; the
    /// finalize hook is the cell's drop and needs no registration.
    pub fn ctor<F, M>(&mut self, f: F) -> &mut Self
    where
        T: Sized,
        F: ForeignCtor<T, M>,
    {
        let arity = F::ARITY;
        let mut declaration = call_declaration("construct ", "new", arity);
        declaration.push_str(" {}");
        self.klass.ctor = Some(KlassCtor {
            signature: call_signature("new", arity),
            declaration,
            trampoline: f.into_allocator(),
        });
        self
    }

    /// Bind an instance method.
    pub fn func<F, M>(&mut self, name: &str, f: F) -> &mut Self
    where
        F: ForeignMethod<T, M>,
    {
        self.klass.insert_method(
            call_signature(name, F::ARITY),
            false,
            call_declaration("foreign ", name, F::ARITY),
            f.into_trampoline(),
        );
        self
    }

    /// Bind a static method.
    pub fn func_static<F, M>(&mut self, name: &str, f: F) -> &mut Self
    where
        F: ForeignStaticFn<M>,
    {
        self.klass.insert_method(
            call_signature(name, F::ARITY),
            true,
            call_declaration("foreign static ", name, F::ARITY),
            f.into_trampoline(),
        );
        self
    }

    /// Bind an operator. The callable's arity must match the operator's.
    pub fn func_op<F, M>(&mut self, op: Operator, f: F) -> Result<&mut Self, BindError>
    where
        F: ForeignMethod<T, M>,
    {
        if F::ARITY != op.arity() {
            return Err(BindError::OperatorArity {
                operator: op.signature(),
                expected: op.arity(),
                actual: F::ARITY,
            });
        }
        self.klass.insert_method(
            op.signature().to_string(),
            false,
            op.declaration().to_string(),
            f.into_trampoline(),
        );
        Ok(self)
    }

    /// Bind a readable and writable property through accessor closures.
    pub fn prop<G, S, MG, MS>(&mut self, name: &str, get: G, set: S) -> &mut Self
    where
        G: ForeignMethod<T, MG>,
        S: ForeignMethod<T, MS>,
    {
        self.prop_readonly(name, get);
        self.klass.insert_method(
            format!("{name}=(_)"),
            false,
            format!("foreign {name}=(rhs)"),
            set.into_trampoline(),
        );
        self
    }

    /// Bind a read-only property. Writes resolve to nothing and fail lookup.
    pub fn prop_readonly<G, M>(&mut self, name: &str, get: G) -> &mut Self
    where
        G: ForeignMethod<T, M>,
    {
        self.klass.insert_method(
            name.to_string(),
            false,
            format!("foreign {name}"),
            get.into_trampoline(),
        );
        self
    }

    /// Expose a field through a getter/setter pair. Same mechanism as
    /// [`prop`](Self::prop); the distinction is naming only.
    pub fn var<G, S, MG, MS>(&mut self, name: &str, get: G, set: S) -> &mut Self
    where
        G: ForeignMethod<T, MG>,
        S: ForeignMethod<T, MS>,
    {
        self.prop(name, get, set)
    }

    pub fn var_readonly<G, M>(&mut self, name: &str, get: G) -> &mut Self
    where
        G: ForeignMethod<T, M>,
    {
        self.prop_readonly(name, get)
    }

    /// Register an upcast to a base class, usually a trait-object type. Only
    /// pairs registered here are reachable; there is no hierarchy walking.
    pub fn base<B>(&mut self, cast: fn(Shared<T>) -> Shared<B>) -> &mut Self
    where
        T: Sized,
        B: ForeignType + ?Sized,
    {
        let upcast: UpcastFn = Rc::new(move |cell: &dyn Foreign| {
            let obj = cell
                .as_any()
                .downcast_ref::<ForeignObject<T>>()
                .ok_or(CastError::ForeignMismatch {
                    expected: std::any::type_name::<T>(),
                    actual: cell.type_name(),
                })?;
            let shared = obj.shared()?;
            Ok(Box::new(cast(shared)) as Box<dyn Any>)
        });
        self.registry
            .register_upcast(TypeHash::of::<T>(), TypeHash::of::<B>(), upcast);
        self
    }
}

/// A parsed textual signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SigKind {
    /// Bare `name`: property read.
    Getter,
    /// `name=(_)`: property write.
    Setter,
    /// `name(_,...)`: call with the given arity.
    Method(usize),
}

/// Parse `name(_,_)`, `name=(_)` and bare `name` signature forms.
pub(crate) fn parse_signature(sig: &str) -> Option<(&str, SigKind)> {
    if sig.is_empty() {
        return None;
    }
    if let Some(name) = sig.strip_suffix("=(_)")
        && !name.is_empty()
    {
        return Some((name, SigKind::Setter));
    }
    if let Some(open) = sig.find('(') {
        if open == 0 || !sig.ends_with(')') {
            return None;
        }
        let name = &sig[..open];
        let inner = &sig[open + 1..sig.len() - 1];
        if inner.is_empty() {
            return Some((name, SigKind::Method(0)));
        }
        let mut arity = 0;
        for part in inner.split(',') {
            if part != "_" {
                return None;
            }
            arity += 1;
        }
        return Some((name, SigKind::Method(arity)));
    }
    Some((sig, SigKind::Getter))
}
