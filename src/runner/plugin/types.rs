//! Core types shared by the interpreter and the built-ins.

use std::collections::HashMap;
use std::rc::Rc;

use crate::parser::JsParser;
use crate::runner::ds::env_record::{
    get_binding_value, has_binding, set_binding_value, EnvRef, EnvironmentRecord,
};
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::{JsObject, JsObjectType, ObjectKind, Property};
use crate::runner::ds::operations::object::{find_property, get, set};
use crate::runner::ds::value::JsValue;
use crate::runner::eval::function::{call_function, construct};
use crate::runner::eval::statement::run_program;
use crate::runner::plugin::registry::BuiltInRegistry;

/// Nesting depth of script function calls before a `RangeError` is raised.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 256;

/// Execution context passed to native functions.
///
/// Holds the realm (global object and registry) plus the running scope:
/// the lexical environment, the environment `var` declarations land in and
/// the current `this`.
pub struct EvalContext {
    pub global_object: JsObjectType,
    pub global_env: EnvRef,
    pub lex_env: EnvRef,
    pub var_env: EnvRef,
    pub this_value: JsValue,
    pub registry: Rc<BuiltInRegistry>,
    pub call_depth: usize,
    pub max_call_depth: usize,
    prototypes: HashMap<String, JsObjectType>,
}

/// Scope state saved across a function call or block.
pub struct SavedScope {
    lex_env: EnvRef,
    var_env: EnvRef,
    this_value: JsValue,
}

impl EvalContext {
    pub fn new() -> Self {
        Self::with_registry(BuiltInRegistry::with_core())
    }

    pub fn with_registry(registry: BuiltInRegistry) -> Self {
        let global_object = JsObject::new_ordinary();
        let global_env = EnvironmentRecord::new_global(global_object.clone());
        let mut ctx = EvalContext {
            global_object: global_object.clone(),
            global_env: global_env.clone(),
            lex_env: global_env.clone(),
            var_env: global_env,
            this_value: JsValue::Object(global_object),
            registry: Rc::new(registry),
            call_depth: 0,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            prototypes: HashMap::new(),
        };
        ctx.install_globals();
        ctx
    }

    /// Materialises every registered built-in: constructors and plain
    /// objects become properties of the global object, and each class gets
    /// a prototype object holding its methods, chained along the registry's
    /// prototype names.
    fn install_globals(&mut self) {
        let registry = self.registry.clone();
        for name in registry.object_names() {
            let object = match registry.get_object(name) {
                Some(o) => o,
                None => continue,
            };
            if object.is_global_scope() {
                let mut global_object = self.global_object.borrow_mut();
                install_members(&mut global_object, object);
                continue;
            }
            let target = match object.constructor {
                Some(func) => JsObject::new_native_function(name.as_str(), func),
                None => JsObject::new_ordinary(),
            };
            install_members(&mut target.borrow_mut(), object);
            if object.constructor.is_some() {
                let prototype = JsObject::new_ordinary();
                {
                    let mut prototype_ref = prototype.borrow_mut();
                    for (method, func) in &object.methods {
                        prototype_ref.set_own(
                            method,
                            JsValue::Object(JsObject::new_native_function(method.as_str(), *func)),
                        );
                    }
                    prototype_ref.set_own("constructor", JsValue::Object(target.clone()));
                }
                target
                    .borrow_mut()
                    .set_own("prototype", JsValue::Object(prototype.clone()));
                self.prototypes.insert(name.clone(), prototype);
            }
            self.global_object
                .borrow_mut()
                .set_own(name, JsValue::Object(target));
        }
        for name in registry.object_names() {
            let parent = registry
                .get_object(name)
                .and_then(|o| o.prototype.as_ref())
                .and_then(|p| self.prototypes.get(p))
                .cloned();
            if let (Some(prototype), Some(parent)) = (self.prototypes.get(name.as_str()), parent) {
                prototype.borrow_mut().prototype = Some(parent);
            }
        }
        let global = JsValue::Object(self.global_object.clone());
        let mut global_object = self.global_object.borrow_mut();
        for alias in ["window", "globalThis", "self"] {
            global_object.set_own(alias, global.clone());
        }
    }

    pub fn get_binding(&self, name: &str) -> Result<JsValue, JErrorType> {
        get_binding_value(&self.lex_env, name)
            .ok_or_else(|| JErrorType::ReferenceError(format!("{} is not defined", name)))
    }

    /// Assigns to the nearest binding; undeclared names become properties
    /// of the global object.
    pub fn set_binding(&mut self, name: &str, value: JsValue) -> Result<(), JErrorType> {
        if !set_binding_value(&self.lex_env, name, value.clone())? {
            self.global_object.borrow_mut().set_own(name, value);
        }
        Ok(())
    }

    pub fn has_binding(&self, name: &str) -> bool {
        has_binding(&self.lex_env, name)
    }

    /// A property of the built-in prototype for `class`, such as the
    /// methods strings and arrays inherit.
    pub fn prototype_property(&self, class: &str, key: &str) -> Option<JsValue> {
        let prototype = self.prototypes.get(class)?;
        match find_property(prototype, key) {
            Some(Property::Data(v)) => Some(v),
            _ => None,
        }
    }

    /// The prototype object of a built-in class.
    pub fn prototype_of(&self, class: &str) -> Option<JsObjectType> {
        self.prototypes.get(class).cloned()
    }

    /// The value a `catch` clause binds for `error`. Engine errors become
    /// error objects linked to their class prototype.
    pub fn error_value(&self, error: JErrorType) -> JsValue {
        let class = error.name();
        let value = error.into_value();
        if let JsValue::Object(o) = &value {
            let mut object = o.borrow_mut();
            if object.prototype.is_none() && matches!(object.kind, ObjectKind::Error) {
                object.prototype = self.prototype_of(class);
            }
        }
        value
    }

    pub fn get_property(&mut self, base: &JsValue, key: &str) -> Result<JsValue, JErrorType> {
        get(self, base, key)
    }

    pub fn set_property(&mut self, base: &JsValue, key: &str, value: JsValue) -> Result<(), JErrorType> {
        set(self, base, key, value)
    }

    pub fn call_function(&mut self, func: &JsValue, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
        call_function(self, func, this, args)
    }

    pub fn construct(&mut self, func: &JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
        construct(self, func, args)
    }

    pub fn enter_scope(&mut self, lex_env: EnvRef, var_env: EnvRef, this_value: JsValue) -> SavedScope {
        SavedScope {
            lex_env: std::mem::replace(&mut self.lex_env, lex_env),
            var_env: std::mem::replace(&mut self.var_env, var_env),
            this_value: std::mem::replace(&mut self.this_value, this_value),
        }
    }

    pub fn restore_scope(&mut self, saved: SavedScope) {
        self.lex_env = saved.lex_env;
        self.var_env = saved.var_env;
        self.this_value = saved.this_value;
    }

    /// Parses and runs `code` in the current scope, returning the value of
    /// the last expression statement.
    pub fn run_script(&mut self, code: &str) -> Result<JsValue, JErrorType> {
        let program = JsParser::parse_to_ast(code).map_err(|e| {
            let (line, column) = e.line_col();
            JErrorType::SyntaxError(format!("Unexpected token at line {}, column {}", line, column))
        })?;
        run_program(&program, self)
    }
}

fn install_members(target: &mut JsObject, object: &BuiltInObject) {
    for (method, func) in &object.static_methods {
        target.set_own(
            method,
            JsValue::Object(JsObject::new_native_function(method.as_str(), *func)),
        );
    }
    for (property, value) in &object.properties {
        target.set_own(property, value.clone());
    }
}

impl Default for EvalContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Function signature for built-in methods.
/// Native functions receive the evaluation context, `this` value, and arguments.
pub type NativeFn = fn(
    ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType>;

/// Name under which free-standing global functions are registered.
pub const GLOBAL_SCOPE: &str = "global";

/// Built-in object definition.
/// Represents a JavaScript built-in object like Array, String or Math.
pub struct BuiltInObject {
    /// Name of the object (e.g., "Array", "Object", "Math").
    pub name: String,

    /// Class whose methods are inherited (e.g., "Object" for most built-ins).
    pub prototype: Option<String>,

    /// Methods available on instances.
    pub methods: HashMap<String, NativeFn>,

    /// Methods of the constructor itself, like `String.fromCharCode`.
    pub static_methods: HashMap<String, NativeFn>,

    /// Static properties.
    pub properties: HashMap<String, JsValue>,

    /// Constructor function, if this object is constructable.
    pub constructor: Option<NativeFn>,
}

impl BuiltInObject {
    /// Create a new built-in object with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        BuiltInObject {
            name: name.into(),
            prototype: Some("Object".to_string()),
            methods: HashMap::new(),
            static_methods: HashMap::new(),
            properties: HashMap::new(),
            constructor: None,
        }
    }

    /// Set the prototype chain parent.
    pub fn with_prototype(mut self, prototype: impl Into<String>) -> Self {
        self.prototype = Some(prototype.into());
        self
    }

    /// Set no prototype (for objects like Object.prototype itself).
    pub fn with_no_prototype(mut self) -> Self {
        self.prototype = None;
        self
    }

    /// Add a native instance method.
    pub fn add_method(mut self, name: impl Into<String>, func: NativeFn) -> Self {
        self.methods.insert(name.into(), func);
        self
    }

    /// Add a native method on the object itself.
    pub fn add_static_method(mut self, name: impl Into<String>, func: NativeFn) -> Self {
        self.static_methods.insert(name.into(), func);
        self
    }

    /// Add a property.
    pub fn add_property(mut self, name: impl Into<String>, value: JsValue) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    /// Set the constructor function.
    pub fn with_constructor(mut self, constructor: NativeFn) -> Self {
        self.constructor = Some(constructor);
        self
    }

    /// Whether the members of this object are installed as global names.
    pub fn is_global_scope(&self) -> bool {
        self.name == GLOBAL_SCOPE
    }
}
