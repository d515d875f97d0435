use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    Number,
    String,
    Boolean,
    Null,
}

impl PrimitiveType {
    pub fn name(&self) -> &'static str {
        match self {
            PrimitiveType::Number => "number",
            PrimitiveType::String => "string",
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::Null => "null",
        }
    }
}

/// Semantic types. Named object types are interned in the checker's
/// registry and shared by value; all types are acyclic.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Primitive(PrimitiveType),
    Array(Box<Type>),
    Object {
        name: Option<String>,
        fields: Vec<(String, Type)>,
    },
    Function {
        params: Vec<Type>,
        return_type: Box<Type>,
        is_async: bool,
    },
    Union(Vec<Type>),
    Promise(Box<Type>),
    Unknown,
}

impl Type {
    pub fn number() -> Type {
        Type::Primitive(PrimitiveType::Number)
    }

    pub fn string() -> Type {
        Type::Primitive(PrimitiveType::String)
    }

    pub fn boolean() -> Type {
        Type::Primitive(PrimitiveType::Boolean)
    }

    pub fn null() -> Type {
        Type::Primitive(PrimitiveType::Null)
    }

    pub fn array(element: Type) -> Type {
        Type::Array(Box::new(element))
    }

    pub fn promise(resolve: Type) -> Type {
        Type::Promise(Box::new(resolve))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Type::Primitive(PrimitiveType::Null))
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Type::Unknown)
    }

    /// Type equality: primitives by name, arrays and promises by
    /// recursive equality of the inner type, objects nominally when
    /// both are named. Everything else is non-equal (structural
    /// comparison is the job of assignability, not equality).
    pub fn equals(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::Primitive(a), Type::Primitive(b)) => a == b,
            (Type::Array(a), Type::Array(b)) => a.equals(b),
            (Type::Promise(a), Type::Promise(b)) => a.equals(b),
            (
                Type::Object { name: Some(a), .. },
                Type::Object { name: Some(b), .. },
            ) => a == b,
            (Type::Unknown, Type::Unknown) => true,
            _ => false,
        }
    }

    /// Build a union from collected types: nested unions flatten in
    /// encounter order (no dedup), `null` alternatives sort to the
    /// end. Zero types is Unknown, one type is itself.
    pub fn union_of(types: Vec<Type>) -> Type {
        let mut flat = Vec::new();
        for t in types {
            match t {
                Type::Union(members) => flat.extend(members),
                other => flat.push(other),
            }
        }
        let (mut non_null, nulls): (Vec<Type>, Vec<Type>) =
            flat.into_iter().partition(|t| !t.is_null());
        non_null.extend(nulls);

        match non_null.len() {
            0 => Type::Unknown,
            1 => non_null.into_iter().next().unwrap(),
            _ => Type::Union(non_null),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Type::Primitive(p) => write!(f, "{}", p.name()),
            Type::Array(element) => match element.as_ref() {
                // composite element types need grouping to stay readable
                Type::Union(_) | Type::Function { .. } => write!(f, "({})[]", element),
                _ => write!(f, "{}[]", element),
            },
            Type::Object { name: Some(name), .. } => write!(f, "{}", name),
            Type::Object { name: None, fields } => {
                write!(f, "{{ ")?;
                for (i, (key, ty)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, ty)?;
                }
                write!(f, " }}")
            }
            Type::Function {
                params,
                return_type,
                is_async,
            } => {
                if *is_async {
                    write!(f, "async ")?;
                }
                write!(f, "(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p)?;
                }
                write!(f, ") => {}", return_type)
            }
            Type::Union(members) => {
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{}", member)?;
                }
                Ok(())
            }
            Type::Promise(resolve) => write!(f, "Promise<{}>", resolve),
            Type::Unknown => write!(f, "unknown"),
        }
    }
}
