// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Runtime type descriptors for EL values
//!
//! [`ElType`] plays the role of a class object: it knows its name, its
//! superclass chain and whether it is a primitive-like type. Host classes are
//! described by [`ClassDef`], which also carries the explicit member registry
//! used for overload resolution.

use crate::error::{ElError, Result};
use crate::registry::member::CandidateMember;
use dashmap::DashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Primitive-like types that have a boxed wrapper counterpart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveType {
    /// `boolean`
    Boolean,
    /// `byte`
    Byte,
    /// `char`
    Char,
    /// `double`
    Double,
    /// `float`
    Float,
    /// `int`
    Int,
    /// `long`
    Long,
    /// `short`
    Short,
    /// `void`
    Void,
}

/// Primitive names sorted for binary search
const PRIMITIVE_NAMES: [(&str, PrimitiveType); 9] = [
    ("boolean", PrimitiveType::Boolean),
    ("byte", PrimitiveType::Byte),
    ("char", PrimitiveType::Char),
    ("double", PrimitiveType::Double),
    ("float", PrimitiveType::Float),
    ("int", PrimitiveType::Int),
    ("long", PrimitiveType::Long),
    ("short", PrimitiveType::Short),
    ("void", PrimitiveType::Void),
];

impl PrimitiveType {
    /// Look up a primitive type by its keyword
    pub fn from_name(name: &str) -> Option<Self> {
        if name.len() > 7 {
            return None;
        }
        PRIMITIVE_NAMES
            .binary_search_by(|(n, _)| n.cmp(&name))
            .ok()
            .map(|idx| PRIMITIVE_NAMES[idx].1)
    }

    /// Keyword naming the primitive type
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::Byte => "byte",
            PrimitiveType::Char => "char",
            PrimitiveType::Double => "double",
            PrimitiveType::Float => "float",
            PrimitiveType::Int => "int",
            PrimitiveType::Long => "long",
            PrimitiveType::Short => "short",
            PrimitiveType::Void => "void",
        }
    }

    /// Name of the boxed wrapper type
    pub fn wrapper_name(self) -> &'static str {
        match self {
            PrimitiveType::Boolean => "Boolean",
            PrimitiveType::Byte => "Byte",
            PrimitiveType::Char => "Character",
            PrimitiveType::Double => "Double",
            PrimitiveType::Float => "Float",
            PrimitiveType::Int => "Integer",
            PrimitiveType::Long => "Long",
            PrimitiveType::Short => "Short",
            PrimitiveType::Void => "Void",
        }
    }

    /// Whether the wrapper of this primitive is a `Number`
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            PrimitiveType::Byte
                | PrimitiveType::Short
                | PrimitiveType::Int
                | PrimitiveType::Long
                | PrimitiveType::Float
                | PrimitiveType::Double
        )
    }
}

/// Runtime type of an EL value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ElType {
    /// Primitive-like type (`int`, `boolean`, ...)
    Primitive(PrimitiveType),
    /// Boxed wrapper of a primitive (`Integer`, `Boolean`, ...)
    Boxed(PrimitiveType),
    /// Type of the `null` literal; assignable to every reference type
    Null,
    /// Root of the type hierarchy
    Object,
    /// Abstract numeric supertype
    Number,
    /// Character string
    String,
    /// Arbitrary precision integer
    BigInteger,
    /// Arbitrary precision decimal
    BigDecimal,
    /// String keyed map
    Map,
    /// Array with the given element type
    Array(Box<ElType>),
    /// Host class or enum
    Class(Arc<ClassDef>),
}

impl ElType {
    /// `boolean`
    pub const BOOLEAN: ElType = ElType::Primitive(PrimitiveType::Boolean);
    /// `char`
    pub const CHAR: ElType = ElType::Primitive(PrimitiveType::Char);
    /// `byte`
    pub const BYTE: ElType = ElType::Primitive(PrimitiveType::Byte);
    /// `short`
    pub const SHORT: ElType = ElType::Primitive(PrimitiveType::Short);
    /// `int`
    pub const INT: ElType = ElType::Primitive(PrimitiveType::Int);
    /// `long`
    pub const LONG: ElType = ElType::Primitive(PrimitiveType::Long);
    /// `float`
    pub const FLOAT: ElType = ElType::Primitive(PrimitiveType::Float);
    /// `double`
    pub const DOUBLE: ElType = ElType::Primitive(PrimitiveType::Double);
    /// `void`
    pub const VOID: ElType = ElType::Primitive(PrimitiveType::Void);
    /// `Boolean`
    pub const BOOLEAN_OBJ: ElType = ElType::Boxed(PrimitiveType::Boolean);
    /// `Character`
    pub const CHARACTER: ElType = ElType::Boxed(PrimitiveType::Char);
    /// `Byte`
    pub const BYTE_OBJ: ElType = ElType::Boxed(PrimitiveType::Byte);
    /// `Short`
    pub const SHORT_OBJ: ElType = ElType::Boxed(PrimitiveType::Short);
    /// `Integer`
    pub const INTEGER: ElType = ElType::Boxed(PrimitiveType::Int);
    /// `Long`
    pub const LONG_OBJ: ElType = ElType::Boxed(PrimitiveType::Long);
    /// `Float`
    pub const FLOAT_OBJ: ElType = ElType::Boxed(PrimitiveType::Float);
    /// `Double`
    pub const DOUBLE_OBJ: ElType = ElType::Boxed(PrimitiveType::Double);

    /// Create an array type with the given element type
    pub fn array_of(element: ElType) -> Self {
        ElType::Array(Box::new(element))
    }

    /// Fully qualified name, as understood by [`TypeRegistry::for_name`]
    pub fn name(&self) -> String {
        match self {
            ElType::Primitive(p) => p.name().to_string(),
            ElType::Boxed(p) => p.wrapper_name().to_string(),
            ElType::Null => "null".to_string(),
            ElType::Object => "Object".to_string(),
            ElType::Number => "Number".to_string(),
            ElType::String => "String".to_string(),
            ElType::BigInteger => "BigInteger".to_string(),
            ElType::BigDecimal => "BigDecimal".to_string(),
            ElType::Map => "Map".to_string(),
            ElType::Array(elem) => format!("{}[]", elem.name()),
            ElType::Class(def) => def.name().to_string(),
        }
    }

    /// Whether this is a primitive-like type
    pub fn is_primitive(&self) -> bool {
        matches!(self, ElType::Primitive(_))
    }

    /// Whether this is an array type
    pub fn is_array(&self) -> bool {
        matches!(self, ElType::Array(_))
    }

    /// Whether this is a registered enum class
    pub fn is_enum(&self) -> bool {
        matches!(self, ElType::Class(def) if def.is_enum())
    }

    /// Element type of an array type
    pub fn element_type(&self) -> Option<&ElType> {
        match self {
            ElType::Array(elem) => Some(elem),
            _ => None,
        }
    }

    /// The wrapper type for primitive-like types, the type itself otherwise
    pub fn boxed(&self) -> ElType {
        match self {
            ElType::Primitive(p) => ElType::Boxed(*p),
            other => other.clone(),
        }
    }

    /// Whether this type is one of the numeric types coercion knows about
    pub fn is_number_type(&self) -> bool {
        match self {
            ElType::Primitive(p) | ElType::Boxed(p) => p.is_numeric(),
            ElType::Number | ElType::BigInteger | ElType::BigDecimal => true,
            _ => false,
        }
    }

    /// Direct superclass; `None` for `Object`, primitives and the null type
    pub fn superclass(&self) -> Option<ElType> {
        match self {
            ElType::Primitive(_) | ElType::Null | ElType::Object => None,
            ElType::Boxed(p) if p.is_numeric() => Some(ElType::Number),
            ElType::BigInteger | ElType::BigDecimal => Some(ElType::Number),
            ElType::Class(def) => Some(def.superclass().cloned().unwrap_or(ElType::Object)),
            _ => Some(ElType::Object),
        }
    }

    /// Superclass chain from the nearest to the furthest ancestor
    pub fn ancestors(&self) -> Vec<ElType> {
        let mut chain = Vec::new();
        let mut current = self.superclass();
        while let Some(ty) = current {
            current = ty.superclass();
            chain.push(ty);
        }
        chain
    }

    /// Whether a variable of type `self` can hold a value of type `src`
    ///
    /// Plain supertype containment; no boxing and no coercion.
    pub fn is_supertype_of(&self, src: &ElType) -> bool {
        if self == src {
            return true;
        }
        match (self, src) {
            (_, ElType::Primitive(_)) | (ElType::Primitive(_), _) => false,
            (ElType::Object, _) => true,
            (ElType::Array(target), ElType::Array(elem)) => {
                !target.is_primitive() && !elem.is_primitive() && target.is_supertype_of(elem)
            }
            _ => src.ancestors().iter().any(|ancestor| ancestor == self),
        }
    }
}

impl fmt::Display for ElType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Declared property of a host class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDef {
    /// Property name
    pub name: String,
    /// Declared property type
    pub property_type: ElType,
    /// Whether the property accepts writes
    pub writable: bool,
}

/// Description of a host class: name, superclass, properties and methods
///
/// Two definitions with the same name denote the same type.
#[derive(Debug)]
pub struct ClassDef {
    name: String,
    superclass: Option<ElType>,
    properties: Vec<PropertyDef>,
    methods: Vec<CandidateMember>,
    constants: Vec<String>,
}

impl ClassDef {
    /// Start describing a class
    ///
    /// Classes are identified by name: equality, hashing and the member
    /// candidate cache of a [`MemberResolver`](crate::registry::MemberResolver)
    /// all go by it, so names must be unique among the classes one resolver
    /// sees.
    pub fn builder(name: impl Into<String>) -> ClassDefBuilder {
        ClassDefBuilder {
            def: ClassDef {
                name: name.into(),
                superclass: None,
                properties: Vec::new(),
                methods: Vec::new(),
                constants: Vec::new(),
            },
        }
    }

    /// Class name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared superclass, `None` meaning `Object`
    pub fn superclass(&self) -> Option<&ElType> {
        self.superclass.as_ref()
    }

    /// Properties declared directly on this class
    pub fn properties(&self) -> &[PropertyDef] {
        &self.properties
    }

    /// Methods declared directly on this class, in declaration order
    pub fn methods(&self) -> &[CandidateMember] {
        &self.methods
    }

    /// Enum constants; empty for ordinary classes
    pub fn constants(&self) -> &[String] {
        &self.constants
    }

    /// Whether this class is an enum
    pub fn is_enum(&self) -> bool {
        !self.constants.is_empty()
    }

    /// Find a property on this class or one of its superclasses
    pub fn find_property(&self, name: &str) -> Option<&PropertyDef> {
        if let Some(prop) = self.properties.iter().find(|p| p.name == name) {
            return Some(prop);
        }
        match &self.superclass {
            Some(ElType::Class(parent)) => parent.find_property(name),
            _ => None,
        }
    }

    /// Public methods named `name`, own declarations first, then inherited
    /// ones that are not overridden
    pub fn members_named(&self, name: &str) -> Vec<CandidateMember> {
        let mut members: Vec<CandidateMember> = self
            .methods
            .iter()
            .filter(|m| m.name() == name)
            .cloned()
            .collect();
        if let Some(ElType::Class(parent)) = &self.superclass {
            for inherited in parent.members_named(name) {
                let overridden = members
                    .iter()
                    .any(|m| m.parameter_types() == inherited.parameter_types());
                if !overridden {
                    members.push(inherited);
                }
            }
        }
        members
    }
}

impl PartialEq for ClassDef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for ClassDef {}

impl Hash for ClassDef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

/// Builder for [`ClassDef`]
#[derive(Debug)]
pub struct ClassDefBuilder {
    def: ClassDef,
}

impl ClassDefBuilder {
    /// Set the superclass
    pub fn extends(mut self, superclass: ElType) -> Self {
        self.def.superclass = Some(superclass);
        self
    }

    /// Declare a property
    pub fn property(mut self, name: impl Into<String>, ty: ElType, writable: bool) -> Self {
        self.def.properties.push(PropertyDef {
            name: name.into(),
            property_type: ty,
            writable,
        });
        self
    }

    /// Declare a method
    pub fn method(mut self, member: CandidateMember) -> Self {
        self.def.methods.push(member);
        self
    }

    /// Declare an enum constant
    pub fn constant(mut self, name: impl Into<String>) -> Self {
        self.def.constants.push(name.into());
        self
    }

    /// Finish the definition
    pub fn build(self) -> Arc<ClassDef> {
        Arc::new(self.def)
    }
}

/// Namespace used to resolve type names, e.g. when restoring serialized
/// expressions
#[derive(Debug, Default)]
pub struct TypeRegistry {
    classes: DashMap<String, Arc<ClassDef>>,
}

impl TypeRegistry {
    /// Create an empty registry; built-in types are always known
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a host class, replacing any class with the same name
    pub fn register(&self, def: Arc<ClassDef>) -> ElType {
        self.classes.insert(def.name().to_string(), Arc::clone(&def));
        ElType::Class(def)
    }

    /// Resolve a type by name
    ///
    /// Empty names resolve to `None`. Names ending in `[]` resolve to arrays
    /// of the named element type, including arrays of primitive types.
    pub fn for_name(&self, name: &str) -> Result<Option<ElType>> {
        if name.is_empty() {
            return Ok(None);
        }
        if let Some(primitive) = PrimitiveType::from_name(name) {
            return Ok(Some(ElType::Primitive(primitive)));
        }
        if let Some(element) = name.strip_suffix("[]") {
            return match self.for_name(element)? {
                Some(elem) => Ok(Some(ElType::array_of(elem))),
                None => Err(ElError::UnknownType {
                    name: name.to_string(),
                }),
            };
        }
        self.builtin(name)
            .or_else(|| self.classes.get(name).map(|def| ElType::Class(Arc::clone(&def))))
            .map(Some)
            .ok_or_else(|| ElError::UnknownType {
                name: name.to_string(),
            })
    }

    fn builtin(&self, name: &str) -> Option<ElType> {
        let ty = match name {
            "Object" => ElType::Object,
            "Number" => ElType::Number,
            "String" => ElType::String,
            "BigInteger" => ElType::BigInteger,
            "BigDecimal" => ElType::BigDecimal,
            "Map" => ElType::Map,
            "Boolean" => ElType::BOOLEAN_OBJ,
            "Byte" => ElType::BYTE_OBJ,
            "Character" => ElType::CHARACTER,
            "Short" => ElType::SHORT_OBJ,
            "Integer" => ElType::INTEGER,
            "Long" => ElType::LONG_OBJ,
            "Float" => ElType::FLOAT_OBJ,
            "Double" => ElType::DOUBLE_OBJ,
            "Void" => ElType::Boxed(PrimitiveType::Void),
            _ => return None,
        };
        Some(ty)
    }

    /// Resolve a list of type names
    pub fn to_type_array(&self, names: &[String]) -> Result<Vec<ElType>> {
        names
            .iter()
            .map(|name| {
                self.for_name(name)?.ok_or_else(|| ElError::UnknownType {
                    name: name.clone(),
                })
            })
            .collect()
    }
}

/// Names of a list of types
pub fn to_type_name_array(types: &[ElType]) -> Vec<String> {
    types.iter().map(ElType::name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_lookup() {
        assert_eq!(PrimitiveType::from_name("int"), Some(PrimitiveType::Int));
        assert_eq!(PrimitiveType::from_name("void"), Some(PrimitiveType::Void));
        assert_eq!(PrimitiveType::from_name("Integer"), None);
        assert_eq!(PrimitiveType::from_name("integer"), None);
    }

    #[test]
    fn test_superclass_chain() {
        assert_eq!(
            ElType::SHORT_OBJ.ancestors(),
            vec![ElType::Number, ElType::Object]
        );
        assert_eq!(ElType::String.ancestors(), vec![ElType::Object]);
        assert!(ElType::INT.ancestors().is_empty());
    }

    #[test]
    fn test_supertype_containment() {
        assert!(ElType::Number.is_supertype_of(&ElType::INTEGER));
        assert!(ElType::Object.is_supertype_of(&ElType::String));
        assert!(!ElType::INTEGER.is_supertype_of(&ElType::INT));
        assert!(!ElType::Object.is_supertype_of(&ElType::INT));
        assert!(
            ElType::array_of(ElType::Object).is_supertype_of(&ElType::array_of(ElType::String))
        );
        assert!(!ElType::array_of(ElType::LONG).is_supertype_of(&ElType::array_of(ElType::INT)));
    }

    #[test]
    fn test_class_hierarchy() {
        let animal = ClassDef::builder("Animal")
            .property("name", ElType::String, true)
            .build();
        let dog = ClassDef::builder("Dog")
            .extends(ElType::Class(Arc::clone(&animal)))
            .build();
        let dog_type = ElType::Class(Arc::clone(&dog));

        assert_eq!(
            dog_type.ancestors(),
            vec![ElType::Class(Arc::clone(&animal)), ElType::Object]
        );
        assert!(ElType::Class(animal).is_supertype_of(&dog_type));
        assert!(dog.find_property("name").is_some());
    }

    #[test]
    fn test_registry_for_name() {
        let registry = TypeRegistry::new();
        let point = registry.register(ClassDef::builder("geo.Point").build());

        assert_eq!(registry.for_name("").unwrap(), None);
        assert_eq!(registry.for_name("int").unwrap(), Some(ElType::INT));
        assert_eq!(registry.for_name("String").unwrap(), Some(ElType::String));
        assert_eq!(
            registry.for_name("int[]").unwrap(),
            Some(ElType::array_of(ElType::INT))
        );
        assert_eq!(
            registry.for_name("geo.Point[][]").unwrap(),
            Some(ElType::array_of(ElType::array_of(point.clone())))
        );
        assert_eq!(registry.for_name("geo.Point").unwrap(), Some(point));
        assert!(matches!(
            registry.for_name("geo.Missing"),
            Err(ElError::UnknownType { .. })
        ));
    }

    #[test]
    fn test_type_names_round_trip() {
        let registry = TypeRegistry::new();
        let types = vec![
            ElType::INT,
            ElType::INTEGER,
            ElType::array_of(ElType::CHAR),
            ElType::BigDecimal,
        ];
        let names = to_type_name_array(&types);
        assert_eq!(names, vec!["int", "Integer", "char[]", "BigDecimal"]);
        assert_eq!(registry.to_type_array(&names).unwrap(), types);
    }
}
