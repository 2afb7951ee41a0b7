//! In-memory [`ClassOracle`] implementation.

use std::collections::HashMap;

use crate::{
    meta::{
        ClassOracle, FieldInfo, KlassId, MethodId, MethodInfo, WellKnownClass, OBJECT_SIGNATURE,
        PAYLOAD_FIELD_NAME,
    },
    Error, Result,
};

/// Byte offset of the payload field inside every boxed-vector object.
const PAYLOAD_OFFSET: u32 = 16;

#[derive(Debug, Clone)]
struct ClassEntry {
    name: String,
    super_klass: Option<KlassId>,
    fields: Vec<FieldInfo>,
}

/// A class hierarchy held entirely in memory.
///
/// `ClassRegistry` is the oracle used by tests, benchmarks and embedders that describe
/// their class system up front. Classes are appended and never removed, so handles stay
/// valid for the lifetime of the registry.
///
/// # Examples
///
/// ```rust,ignore
/// use vecbox::meta::{ClassOracle, ClassRegistry, VectorFamily, WellKnownClass};
///
/// let mut registry = ClassRegistry::with_vector_classes();
/// let mask = registry.define_class("Int128Mask", WellKnownClass::VectorMask)?;
/// assert_eq!(registry.vector_family(mask), Some(VectorFamily::Mask));
/// assert_eq!(registry.payload_field()?.offset_in_bytes, 16);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ClassRegistry {
    classes: Vec<ClassEntry>,
    methods: Vec<MethodInfo>,
    well_known: HashMap<WellKnownClass, KlassId>,
}

impl ClassRegistry {
    /// Creates an empty registry without any classes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry preloaded with the object root and the boxed-vector bases.
    ///
    /// The payload base declares the `payload` object field; `Vector`, `VectorMask` and
    /// `VectorShuffle` extend it.
    #[must_use]
    pub fn with_vector_classes() -> Self {
        let mut registry = Self::new();
        let object = registry.push_class("java.lang.Object", None);
        let payload = registry.push_class(
            "jdk.internal.vm.vector.VectorSupport$VectorPayload",
            Some(object),
        );
        registry.classes[payload.index() as usize]
            .fields
            .push(FieldInfo {
                holder: payload,
                name: PAYLOAD_FIELD_NAME.to_string(),
                signature: OBJECT_SIGNATURE.to_string(),
                offset_in_bytes: PAYLOAD_OFFSET,
                is_static: false,
            });
        let vector =
            registry.push_class("jdk.internal.vm.vector.VectorSupport$Vector", Some(payload));
        let mask =
            registry.push_class("jdk.internal.vm.vector.VectorSupport$VectorMask", Some(payload));
        let shuffle = registry.push_class(
            "jdk.internal.vm.vector.VectorSupport$VectorShuffle",
            Some(payload),
        );

        registry.well_known.insert(WellKnownClass::Object, object);
        registry
            .well_known
            .insert(WellKnownClass::VectorPayload, payload);
        registry.well_known.insert(WellKnownClass::Vector, vector);
        registry.well_known.insert(WellKnownClass::VectorMask, mask);
        registry
            .well_known
            .insert(WellKnownClass::VectorShuffle, shuffle);
        registry
    }

    fn push_class(&mut self, name: &str, super_klass: Option<KlassId>) -> KlassId {
        let id = KlassId::new(self.classes.len() as u32);
        self.classes.push(ClassEntry {
            name: name.to_string(),
            super_klass,
            fields: Vec::new(),
        });
        id
    }

    /// Defines a class extending one of the well-known bases.
    ///
    /// # Arguments
    ///
    /// * `name` - Name of the new class
    /// * `base` - Well-known superclass
    ///
    /// # Errors
    ///
    /// Returns [`Error::Error`] if `base` has not been registered.
    pub fn define_class(&mut self, name: &str, base: WellKnownClass) -> Result<KlassId> {
        let super_klass = self
            .well_known
            .get(&base)
            .copied()
            .ok_or_else(|| Error::Error(format!("well-known class {base} is not loaded")))?;
        Ok(self.push_class(name, Some(super_klass)))
    }

    /// Defines a class extending an arbitrary registered class.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownClass`] if `super_klass` is not registered.
    pub fn define_subclass(&mut self, name: &str, super_klass: KlassId) -> Result<KlassId> {
        if super_klass.index() as usize >= self.classes.len() {
            return Err(Error::UnknownClass(super_klass.index()));
        }
        Ok(self.push_class(name, Some(super_klass)))
    }

    /// Registers a method of `holder` taking `arg_size` argument slots.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownClass`] if `holder` is not registered.
    pub fn define_method(
        &mut self,
        holder: KlassId,
        name: &str,
        arg_size: u32,
    ) -> Result<MethodId> {
        if holder.index() as usize >= self.classes.len() {
            return Err(Error::UnknownClass(holder.index()));
        }
        let id = MethodId::new(self.methods.len() as u32);
        self.methods.push(MethodInfo {
            holder,
            name: name.to_string(),
            arg_size,
        });
        Ok(id)
    }

    /// Returns the descriptor of a registered method.
    #[must_use]
    pub fn method(&self, method: MethodId) -> Option<&MethodInfo> {
        self.methods.get(method.index() as usize)
    }

    /// Returns the number of registered classes.
    #[must_use]
    pub fn class_count(&self) -> usize {
        self.classes.len()
    }
}

impl ClassOracle for ClassRegistry {
    fn well_known(&self, which: WellKnownClass) -> Option<KlassId> {
        self.well_known.get(&which).copied()
    }

    fn is_subclass_of(&self, klass: KlassId, base: KlassId) -> bool {
        let mut current = Some(klass);
        // The hierarchy is a tree built by appending, so walking up terminates.
        while let Some(k) = current {
            if k == base {
                return true;
            }
            current = self
                .classes
                .get(k.index() as usize)
                .and_then(|entry| entry.super_klass);
        }
        false
    }

    fn class_name(&self, klass: KlassId) -> Option<String> {
        self.classes
            .get(klass.index() as usize)
            .map(|entry| entry.name.clone())
    }

    fn field_by_name(
        &self,
        holder: KlassId,
        name: &str,
        signature: &str,
        is_static: bool,
    ) -> Option<FieldInfo> {
        let mut current = Some(holder);
        while let Some(k) = current {
            let entry = self.classes.get(k.index() as usize)?;
            if let Some(field) = entry
                .fields
                .iter()
                .find(|f| f.name == name && f.signature == signature && f.is_static == is_static)
            {
                return Some(field.clone());
            }
            current = entry.super_klass;
        }
        None
    }

    fn method_arg_size(&self, method: MethodId) -> Option<u32> {
        self.method(method).map(|m| m.arg_size)
    }
}
